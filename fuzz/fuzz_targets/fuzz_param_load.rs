//! Fuzz target: self-healing parameter load
//!
//! Fills every stored field with arbitrary bytes and verifies:
//! - `ControlParameters::load` never panics
//! - every loaded field is inside its valid range
//! - neither gain triplet comes back all zero
//! - a second load from the repaired store changes nothing
//!
//! cargo fuzz run fuzz_param_load

#![no_main]

use hypotherm::adapters::log_sink::LogEventSink;
use hypotherm::adapters::memory_store::MemoryStorage;
use hypotherm::adapters::param_store::{PARAM_NAMESPACE, ParamStore};
use hypotherm::config::{ControlParameters, ParamField};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let store = MemoryStorage::new();
    // Each field takes a length byte followed by up to 7 value bytes;
    // a zero length leaves the field missing.
    let mut rest = data;
    for field in ParamField::ALL {
        let Some((&len, tail)) = rest.split_first() else {
            break;
        };
        let len = (len as usize % 8).min(tail.len());
        if len > 0 {
            store.put_raw(PARAM_NAMESPACE, field.key(), &tail[..len]);
        }
        rest = &tail[len..];
    }

    let mut store = ParamStore::new(store);
    let mut sink = LogEventSink::new();
    let params = ControlParameters::load(&mut store, &mut sink);

    for field in ParamField::ALL {
        let value = field.get(&params);
        assert!(field.accepts(value), "{} loaded out of range: {value}", field.key());
    }
    assert!(!params.heating.is_all_zero());
    assert!(!params.cooling.is_all_zero());

    let again = ControlParameters::load(&mut store, &mut sink);
    assert_eq!(params, again, "repaired store must load identically");
});
