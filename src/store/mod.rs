//! Durable key-value state shared by the pipeline handlers
//!
//! Handlers never touch string keys directly; they go through
//! [`SharedState`], which owns a [`KeyValueStore`] backend. Production uses
//! the JSON file backend, tests use the in-memory one.

pub mod file;
pub mod memory;
pub mod shared;

use serde_json::Value;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use shared::SharedState;

/// Errors raised by a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded.
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal get/set contract for persisted handler state.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
}
