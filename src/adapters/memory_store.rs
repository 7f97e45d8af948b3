//! In-memory [`StoragePort`] backend.
//!
//! Backs the host simulator and tests. Keys are namespaced as
//! `namespace::key`; every write replaces the whole value, which gives
//! the same per-key atomicity the flash backend promises.

use std::cell::RefCell;
use std::collections::HashMap;

use log::debug;

use crate::app::ports::{StorageError, StoragePort};

/// Largest value accepted per key.
pub const MAX_VALUE_SIZE: usize = 256;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    store: RefCell<HashMap<String, Vec<u8>>>,
    /// Reject writes once this many keys exist (`None` = unlimited).
    capacity: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports [`StorageError::Full`] past `keys` entries.
    pub fn with_capacity(keys: usize) -> Self {
        Self {
            store: RefCell::default(),
            capacity: Some(keys),
        }
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// Overwrite raw bytes, bypassing encoding (corruption tests).
    pub fn put_raw(&self, namespace: &str, key: &str, data: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let composite = Self::composite_key(namespace, key);
        match self.store.borrow().get(&composite) {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_VALUE_SIZE {
            return Err(StorageError::IoError);
        }
        let composite = Self::composite_key(namespace, key);
        let mut store = self.store.borrow_mut();
        let full = self.capacity.is_some_and(|cap| store.len() >= cap);
        if full && !store.contains_key(&composite) {
            return Err(StorageError::Full);
        }
        debug!("storage: write {composite} ({} bytes)", data.len());
        store.insert(composite, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&Self::composite_key(namespace, key))
    }
}
