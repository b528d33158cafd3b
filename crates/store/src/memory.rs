//! In-memory [`KvStore`] for tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::{KvStore, StoreError};

/// Non-durable store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing the engine (test setup).
    pub fn insert(&self, key: &str, value: &str) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
