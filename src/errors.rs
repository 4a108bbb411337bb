//! Error hierarchy for the in-memory watch store.
//!
//! The watcher core itself never fails: admission rejection, stale events and
//! sends after cancellation are expected outcomes, not errors. Errors only
//! arise at the store surface (object CRUD) and while loading configuration.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Object store operation failures
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Create was called with a key that is already stored
    #[error("Object {key} already exists")]
    AlreadyExists { key: String },

    /// Update or delete was called with an unknown key
    #[error("Object {key} not found")]
    NotFound { key: String },

    /// Watch requested outside of a tokio runtime or after the store stopped
    #[error("Store is not running")]
    NotRunning,
}
