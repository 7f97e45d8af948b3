//! Per-field [`ConfigPort`] over any [`StoragePort`].
//!
//! Each [`ParamField`] lives under its own key in the `ctrl` namespace,
//! postcard-encoded. Range checks are the domain's job; this adapter
//! only reports values that fail to decode as
//! [`ConfigError::Corrupted`].

use crate::app::ports::{ConfigError, ConfigPort, StoragePort};
use crate::config::ParamField;

pub const PARAM_NAMESPACE: &str = "ctrl";

/// Scratch size for one encoded field.
const FIELD_BUF: usize = 8;

pub struct ParamStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> ParamStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Drop every stored field (factory reset). Next load writes defaults.
    pub fn clear(&mut self) -> Result<(), ConfigError> {
        for field in ParamField::ALL {
            self.storage.delete(PARAM_NAMESPACE, field.key())?;
        }
        Ok(())
    }
}

impl<S: StoragePort> ConfigPort for ParamStore<S> {
    fn load_field(&self, field: ParamField) -> Result<f32, ConfigError> {
        let mut buf = [0u8; FIELD_BUF];
        let len = self.storage.read(PARAM_NAMESPACE, field.key(), &mut buf)?;
        postcard::from_bytes::<f32>(&buf[..len]).map_err(|_| ConfigError::Corrupted)
    }

    fn save_field(&mut self, field: ParamField, value: f32) -> Result<(), ConfigError> {
        let mut buf = [0u8; FIELD_BUF];
        let bytes = postcard::to_slice(&value, &mut buf).map_err(|_| ConfigError::IoError)?;
        self.storage.write(PARAM_NAMESPACE, field.key(), bytes)?;
        Ok(())
    }
}
