#![forbid(unsafe_code)]

//! Runtime services: key-value persistence and configuration.

pub mod config;
pub mod persistence;

pub use config::{ConfigError, LogFormat, LoggingConfig, Messages, TimingConfig, TrackerConfig};
#[cfg(feature = "file-storage")]
pub use persistence::FileStorage;
pub use persistence::{
    Deferred, LatentStore, MemoryStorage, OpKind, PersistenceAdapter, PersistenceStats,
    StorageBackend, StorageError, StorageResult, Store, SyncStore, WriteHandle, WriteOp,
    WriteOutcome,
};
