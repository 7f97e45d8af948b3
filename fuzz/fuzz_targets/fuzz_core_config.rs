//! Fuzz target: `CoreConfig` JSON overrides
//!
//! Parses arbitrary bytes as a config file and verifies:
//! - parsing and `validate` never panic
//! - a config that validates drives a service tick without panicking
//!
//! cargo fuzz run fuzz_core_config

#![no_main]

use hypotherm::adapters::log_sink::LogEventSink;
use hypotherm::adapters::sim_plant::SimPlant;
use hypotherm::adapters::time::SimClock;
use hypotherm::app::commands::AppCommand;
use hypotherm::app::service::AppService;
use hypotherm::config::{ControlParameters, CoreConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<CoreConfig>(data) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }

    let clock = SimClock::new(0);
    let mut plant = SimPlant::new(37.0, 22.0);
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(config, ControlParameters::default(), 0);
    app.start(&mut plant, &mut sink);
    let _ = app.handle_command(AppCommand::Start, &clock, &mut plant, &mut sink);
    for _ in 0..10 {
        clock.advance(100);
        app.tick(&clock, &mut plant, &mut sink);
    }
});
