//! Calibration persistence.
//!
//! Persistence is an external collaborator: the manager only sees an opaque
//! key/value blob store, injected at construction. Long-term storage format
//! is the consuming layer's responsibility.

use std::collections::HashMap;

use crate::error::CalibrationError;

/// Opaque blob store for calibration persistence.
pub trait CalibrationStore: Send {
    /// Loads the blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::StoreError`] if the backing store fails.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError>;

    /// Saves `blob` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::StoreError`] if the backing store fails.
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<(), CalibrationError>;
}

/// In-memory store used in tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CalibrationError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn save(&mut self, key: &str, blob: &[u8]) -> Result<(), CalibrationError> {
        self.blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}
