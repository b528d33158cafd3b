//! Persistence gateway for the warning engine.
//!
//! The engine persists its state as four independent JSON documents
//! behind a plain key/value contract: live warnings, history, config,
//! and the suppressed-notification id list. Implementations here are
//! [`MemoryStore`] (tests, throwaway sessions) and [`JsonFileStore`]
//! (one file per key on disk).
//!
//! Decoding is the engine's job; a store only moves strings. A missing
//! key is `Ok(None)`, never an error.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Document keys, unchanged from earlier deployments so existing saved
/// state loads as-is.
pub mod keys {
    /// Live warning list.
    pub const WARNINGS: &str = "city-sense-warnings";
    /// Append-only warning history.
    pub const WARNING_HISTORY: &str = "city-sense-warning-history";
    /// Warning rule configuration.
    pub const WARNING_CONFIG: &str = "city-sense-warning-config";
    /// Suppressed-notification warning ids (stored as an array).
    pub const SUPPRESSED_NOTIFICATIONS: &str = "city-sense-closed-notifications";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Durable key/value storage of serialized documents.
pub trait KvStore {
    /// Load the document stored under `key`, or `None` if absent.
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous document.
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}
