#![forbid(unsafe_code)]

//! Key-value persistence for form snapshots and survey responses.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PersistenceAdapter                         │
//! │   - JSON encode on save, decode on load                       │
//! │   - One write lane per key (last call wins)                   │
//! │   - Read-your-writes for keys with pending writes             │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Store                                 │
//! │   - SyncStore: completes inside the call                      │
//! │   - LatentStore: completes after a latency on the scheduler   │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     StorageBackend                            │
//! │   - MemoryStorage: in-memory (testing, ephemeral)             │
//! │   - FileStorage: JSON document (requires file-storage)        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic; they resolve
//!    handles with `Err` and are logged.
//! 2. **Atomic writes**: file storage uses the write-rename pattern.
//! 3. **Last call wins**: per key, at most one operation is in flight and at
//!    most one is queued; a newer write replaces the queued one, so the value
//!    left in the store is always the one from the most recent call.
//! 4. **Corrupt records read as absent**: parse failures on load are logged at
//!    warn level and surface as `None`.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Handle resolves `Err`, lane continues |
//! | `StorageError::Serialization` | Record cannot be encoded | Handle resolves `Err` immediately |
//! | `StorageError::Corruption` | Lock poisoned, bad file format | Handle resolves `Err` |
//! | Corrupt stored text | Manual edits, schema drift | `load` yields `None`, warn logged |

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use gtrack_core::scheduler::Scheduler;
use serde::Serialize;
use serde::de::DeserializeOwned;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Record could not be encoded or decoded.
    Serialization(String),
    /// Storage is corrupted or in an invalid format.
    Corruption(String),
    /// Backend is not available.
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_)
            | StorageError::Corruption(_)
            | StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A durable string-to-string store.
///
/// Implementations must be thread-safe (`Send + Sync`); the adapter itself
/// is single-threaded but backends may be shared with other components.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Stored text for `key`, if any.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// All stored keys, in no particular order.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Whether the backend can currently accept writes.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory backend. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with entries.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().map(|g| g.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.keys().cloned().collect())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires file-storage feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "file-storage")]
mod file_storage {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// On-disk document.
    #[derive(Serialize, Deserialize)]
    struct StoreFile {
        /// Format version for future migrations.
        format_version: u32,
        /// Map of key -> stored text.
        entries: BTreeMap<String, String>,
    }

    impl StoreFile {
        const FORMAT_VERSION: u32 = 1;

        fn new() -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                entries: BTreeMap::new(),
            }
        }
    }

    /// File-based backend: one JSON document holding every key.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "entries": {
    ///     "form_profile": "{\"email\":\"sara@example.sa\"}"
    ///   }
    /// }
    /// ```
    ///
    /// # Atomic Writes
    ///
    /// Every mutation rewrites the document:
    /// 1. Write to `{path}.tmp`
    /// 2. Flush and sync
    /// 3. Rename `{path}.tmp` -> `{path}`
    pub struct FileStorage {
        path: PathBuf,
        /// Serializes read-modify-write cycles.
        lock: Mutex<()>,
    }

    impl FileStorage {
        /// Create a file storage at the given path.
        ///
        /// The file does not need to exist; it is created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
                lock: Mutex::new(()),
            }
        }

        /// Storage at `$XDG_STATE_HOME/gtrack/{app_name}/store.json`,
        /// falling back to `~/.local/state`, then the current directory.
        #[must_use]
        pub fn default_for_app(app_name: &str) -> Self {
            let path = dirs_or_fallback()
                .join("gtrack")
                .join(app_name)
                .join("store.json");
            Self::new(path)
        }

        /// Location of the backing document.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn read_document(&self) -> StorageResult<StoreFile> {
            if !self.path.exists() {
                return Ok(StoreFile::new());
            }
            let reader = BufReader::new(File::open(&self.path)?);
            let doc: StoreFile = serde_json::from_reader(reader).map_err(|e| {
                StorageError::Serialization(format!("failed to parse store file: {e}"))
            })?;
            if doc.format_version != StoreFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = doc.format_version,
                    expected = StoreFile::FORMAT_VERSION,
                    "store file format version mismatch, ignoring stored entries"
                );
                return Ok(StoreFile::new());
            }
            Ok(doc)
        }

        fn write_document(&self, doc: &StoreFile) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, doc).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize store: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(
                path = %self.path.display(),
                entries = doc.entries.len(),
                "wrote store file"
            );
            Ok(())
        }

        fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> StorageResult<()> {
            let _guard = self
                .lock
                .lock()
                .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
            let mut doc = self.read_document()?;
            f(&mut doc.entries);
            self.write_document(&doc)
        }
    }

    fn dirs_or_fallback() -> PathBuf {
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(state_home);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state");
        }
        PathBuf::from(".")
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.read_document()?.entries.remove(key))
        }

        fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
            self.modify(|entries| {
                entries.insert(key.to_string(), value.to_string());
            })
        }

        fn remove_item(&self, key: &str) -> StorageResult<()> {
            self.modify(|entries| {
                entries.remove(key);
            })
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            Ok(self.read_document()?.entries.into_keys().collect())
        }

        fn is_available(&self) -> bool {
            if let Some(parent) = self.path.parent() {
                if !parent.exists() {
                    return std::fs::create_dir_all(parent).is_ok();
                }
                let probe = parent.join(".gtrack_test_write");
                if std::fs::write(&probe, b"test").is_ok() {
                    let _ = std::fs::remove_file(&probe);
                    return true;
                }
            }
            false
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

// ─────────────────────────────────────────────────────────────────────────────
// Deferred handles
// ─────────────────────────────────────────────────────────────────────────────

type Continuation<T> = Box<dyn FnOnce(&T)>;

struct DeferredState<T> {
    value: Option<Rc<T>>,
    continuations: Vec<Continuation<T>>,
}

/// Single-assignment result handle.
///
/// Resolves at most once; continuations registered with [`Deferred::then`]
/// run in registration order when it resolves (or immediately if it already
/// has). Clones observe the same result.
pub struct Deferred<T> {
    state: Rc<RefCell<DeferredState<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static> Deferred<T> {
    /// An unresolved handle.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            state: Rc::new(RefCell::new(DeferredState {
                value: None,
                continuations: Vec::new(),
            })),
        }
    }

    /// A handle that is already resolved with `value`.
    #[must_use]
    pub fn ready(value: T) -> Self {
        let deferred = Self::pending();
        deferred.resolve(value);
        deferred
    }

    /// Resolve the handle. Later calls are ignored and return `false`.
    pub fn resolve(&self, value: T) -> bool {
        let (value, continuations) = {
            let mut state = self.state.borrow_mut();
            if state.value.is_some() {
                return false;
            }
            let value = Rc::new(value);
            state.value = Some(Rc::clone(&value));
            (value, std::mem::take(&mut state.continuations))
        };
        for continuation in continuations {
            continuation(&value);
        }
        true
    }

    /// Run `f` with the result once available.
    pub fn then(&self, f: impl FnOnce(&T) + 'static) {
        let ready = self.state.borrow().value.clone();
        match ready {
            Some(value) => f(&value),
            None => self.state.borrow_mut().continuations.push(Box::new(f)),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().value.is_some()
    }

    /// Shared reference to the result, if resolved.
    #[must_use]
    pub fn get(&self) -> Option<Rc<T>> {
        self.state.borrow().value.clone()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Cloned result, if resolved.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.get().map(|value| (*value).clone())
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Deferred")
            .field("ready", &state.value.is_some())
            .field("continuations", &state.continuations.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store seam
// ─────────────────────────────────────────────────────────────────────────────

/// A mutation sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set(String),
    Remove,
}

/// Operation kinds, used to pick latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Set,
    Remove,
}

impl WriteOp {
    fn kind(&self) -> OpKind {
        match self {
            WriteOp::Set(_) => OpKind::Set,
            WriteOp::Remove => OpKind::Remove,
        }
    }
}

/// Completion callback for reads.
pub type ReadDone = Box<dyn FnOnce(StorageResult<Option<String>>)>;
/// Completion callback for writes.
pub type WriteDone = Box<dyn FnOnce(StorageResult<()>)>;

/// Completion-based access to a backend.
///
/// Implementations may call `done` before returning (synchronous stores) or
/// later (asynchronous stores). Callers must not hold borrows across either.
pub trait Store {
    fn name(&self) -> &str;
    fn read(&self, key: &str, done: ReadDone);
    fn write(&self, key: &str, op: WriteOp, done: WriteDone);
}

fn apply(backend: &dyn StorageBackend, key: &str, op: &WriteOp) -> StorageResult<()> {
    if !backend.is_available() {
        return Err(StorageError::Unavailable(format!(
            "{} cannot accept writes",
            backend.name()
        )));
    }
    match op {
        WriteOp::Set(text) => backend.set_item(key, text),
        WriteOp::Remove => backend.remove_item(key),
    }
}

/// Store that completes every operation before returning.
#[derive(Clone)]
pub struct SyncStore {
    backend: Arc<dyn StorageBackend>,
}

impl SyncStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }
}

impl Store for SyncStore {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn read(&self, key: &str, done: ReadDone) {
        done(self.backend.get_item(key));
    }

    fn write(&self, key: &str, op: WriteOp, done: WriteDone) {
        done(apply(self.backend.as_ref(), key, &op));
    }
}

impl fmt::Debug for SyncStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

type LatencyFn = Box<dyn FnMut(OpKind, &str) -> Duration>;

/// Store whose operations complete after a latency on the scheduler.
///
/// The backend is touched when the operation completes, not when it is
/// issued, so two overlapping operations with different latencies land in
/// completion order.
pub struct LatentStore {
    backend: Arc<dyn StorageBackend>,
    scheduler: Scheduler,
    latency: RefCell<LatencyFn>,
}

impl LatentStore {
    /// Every operation takes `latency`.
    pub fn new(backend: Arc<dyn StorageBackend>, scheduler: &Scheduler, latency: Duration) -> Self {
        Self::with_latency_fn(backend, scheduler, move |_, _| latency)
    }

    /// Latency chosen per operation by `latency`.
    pub fn with_latency_fn(
        backend: Arc<dyn StorageBackend>,
        scheduler: &Scheduler,
        latency: impl FnMut(OpKind, &str) -> Duration + 'static,
    ) -> Self {
        Self {
            backend,
            scheduler: scheduler.clone(),
            latency: RefCell::new(Box::new(latency)),
        }
    }

    fn delay(&self, kind: OpKind, key: &str) -> Duration {
        (self.latency.borrow_mut())(kind, key)
    }
}

impl Store for LatentStore {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn read(&self, key: &str, done: ReadDone) {
        let delay = self.delay(OpKind::Read, key);
        let backend = Arc::clone(&self.backend);
        let key = key.to_string();
        self.scheduler
            .schedule(delay, move || done(backend.get_item(&key)));
    }

    fn write(&self, key: &str, op: WriteOp, done: WriteDone) {
        let delay = self.delay(op.kind(), key);
        let backend = Arc::clone(&self.backend);
        let key = key.to_string();
        self.scheduler
            .schedule(delay, move || done(apply(backend.as_ref(), &key, &op)));
    }
}

impl fmt::Debug for LatentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatentStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// How a write handle resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The operation reached the store.
    Written,
    /// A newer call for the same key replaced this one before it started.
    Superseded,
}

/// Handle returned by [`PersistenceAdapter::save`] and
/// [`PersistenceAdapter::clear`].
pub type WriteHandle = Deferred<Result<WriteOutcome, Rc<StorageError>>>;

struct QueuedWrite {
    op: WriteOp,
    handle: WriteHandle,
}

#[derive(Default)]
struct Lane {
    in_flight: Option<WriteOp>,
    queued: Option<QueuedWrite>,
}

impl Lane {
    /// Freshest value a reader should observe, if a write is pending.
    fn pending_value(&self) -> Option<&WriteOp> {
        self.queued
            .as_ref()
            .map(|queued| &queued.op)
            .or(self.in_flight.as_ref())
    }
}

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceStats {
    pub writes_issued: u64,
    pub writes_completed: u64,
    pub writes_superseded: u64,
    pub write_failures: u64,
    pub corrupt_loads: u64,
}

struct AdapterInner {
    lanes: HashMap<String, Lane>,
    stats: PersistenceStats,
}

/// JSON persistence with per-key write serialization.
///
/// Cloning yields another handle to the same adapter.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Rc<dyn Store>,
    inner: Rc<RefCell<AdapterInner>>,
}

impl PersistenceAdapter {
    /// Adapter over an arbitrary [`Store`].
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Rc::new(store),
            inner: Rc::new(RefCell::new(AdapterInner {
                lanes: HashMap::new(),
                stats: PersistenceStats::default(),
            })),
        }
    }

    /// Synchronous adapter over `backend`.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self::new(SyncStore::new(backend))
    }

    /// Synchronous adapter over a fresh [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryStorage::new()))
    }

    /// Name of the underlying store.
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Encode `record` as JSON and write it under `key`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, record: &T) -> WriteHandle {
        match serde_json::to_string(record) {
            Ok(text) => self.submit(key, WriteOp::Set(text)),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode record");
                Deferred::ready(Err(Rc::new(StorageError::Serialization(e.to_string()))))
            }
        }
    }

    /// Delete the record under `key`. Ordered with saves on the same key.
    pub fn clear(&self, key: &str) -> WriteHandle {
        self.submit(key, WriteOp::Remove)
    }

    /// Read and decode the record under `key`.
    ///
    /// Missing, unreadable and corrupt records all resolve to `None`.
    pub fn load<T: DeserializeOwned + 'static>(&self, key: &str) -> Deferred<Option<T>> {
        let pending = {
            let inner = self.inner.borrow();
            inner.lanes.get(key).and_then(|lane| lane.pending_value().cloned())
        };
        if let Some(op) = pending {
            let value = match op {
                WriteOp::Set(text) => self.decode(key, &text),
                WriteOp::Remove => None,
            };
            return Deferred::ready(value);
        }

        let handle = Deferred::pending();
        let resolver = handle.clone();
        let adapter = self.clone();
        let owned_key = key.to_string();
        self.store.read(
            key,
            Box::new(move |result| {
                let value = match result {
                    Ok(Some(text)) => adapter.decode(&owned_key, &text),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(key = %owned_key, error = %e, "failed to read record");
                        None
                    }
                };
                resolver.resolve(value);
            }),
        );
        handle
    }

    /// Whether any write for `key` is in flight or queued.
    #[must_use]
    pub fn has_pending(&self, key: &str) -> bool {
        self.inner.borrow().lanes.contains_key(key)
    }

    /// Number of keys with pending writes.
    #[must_use]
    pub fn pending_keys(&self) -> usize {
        self.inner.borrow().lanes.len()
    }

    #[must_use]
    pub fn stats(&self) -> PersistenceStats {
        self.inner.borrow().stats
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, text: &str) -> Option<T> {
        match serde_json::from_str(text) {
            Ok(value) => Some(value),
            Err(e) => {
                self.inner.borrow_mut().stats.corrupt_loads += 1;
                tracing::warn!(key, error = %e, "stored record is corrupt, treating as absent");
                None
            }
        }
    }

    fn submit(&self, key: &str, op: WriteOp) -> WriteHandle {
        let handle = WriteHandle::pending();
        let (start, superseded) = {
            let mut inner = self.inner.borrow_mut();
            inner.stats.writes_issued += 1;
            let lane = inner.lanes.entry(key.to_string()).or_default();
            if lane.in_flight.is_some() {
                let previous = lane.queued.replace(QueuedWrite {
                    op,
                    handle: handle.clone(),
                });
                if previous.is_some() {
                    inner.stats.writes_superseded += 1;
                }
                (None, previous)
            } else {
                lane.in_flight = Some(op.clone());
                (Some(op), None)
            }
        };

        if let Some(previous) = superseded {
            tracing::debug!(key, "queued write superseded by a newer call");
            previous.handle.resolve(Ok(WriteOutcome::Superseded));
        }
        if let Some(op) = start {
            self.start(key.to_string(), op, handle.clone());
        }
        handle
    }

    fn start(&self, key: String, op: WriteOp, handle: WriteHandle) {
        let adapter = self.clone();
        let store_key = key.clone();
        self.store.write(
            &store_key,
            op,
            Box::new(move |result| adapter.complete(key, handle, result)),
        );
    }

    fn complete(&self, key: String, handle: WriteHandle, result: StorageResult<()>) {
        {
            let mut inner = self.inner.borrow_mut();
            match &result {
                Ok(()) => inner.stats.writes_completed += 1,
                Err(_) => inner.stats.write_failures += 1,
            }
        }
        match result {
            Ok(()) => {
                handle.resolve(Ok(WriteOutcome::Written));
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "write failed");
                handle.resolve(Err(Rc::new(e)));
            }
        }

        let next = {
            let mut inner = self.inner.borrow_mut();
            let queued = inner
                .lanes
                .get_mut(&key)
                .and_then(|lane| lane.queued.take());
            match queued {
                Some(queued) => {
                    if let Some(lane) = inner.lanes.get_mut(&key) {
                        lane.in_flight = Some(queued.op.clone());
                    }
                    Some(queued)
                }
                None => {
                    inner.lanes.remove(&key);
                    None
                }
            }
        };
        if let Some(queued) = next {
            self.start(key, queued.op, queued.handle);
        }
    }
}

impl fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("store", &self.store.name())
            .field("pending_keys", &self.inner.borrow().lanes.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


#[cfg(all(test, feature = "file-storage"))]
mod file_storage_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let storage = FileStorage::new(&path);

        storage.set_item("form_profile", "{\"email\":\"a@b.sa\"}").unwrap();
        assert!(path.exists());

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get_item("form_profile").unwrap().as_deref(),
            Some("{\"email\":\"a@b.sa\"}")
        );
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("absent.json"));
        assert!(storage.get_item("k").unwrap().is_none());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dirs").join("store.json");
        let storage = FileStorage::new(&path);
        storage.set_item("k", "1").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_storage_remove_item() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("store.json"));
        storage.set_item("a", "1").unwrap();
        storage.set_item("b", "2").unwrap();
        storage.remove_item("a").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn file_storage_corrupt_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get_item("k"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn file_storage_version_mismatch_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, r#"{"format_version":99,"entries":{"k":"1"}}"#).unwrap();
        let storage = FileStorage::new(&path);
        assert!(storage.get_item("k").unwrap().is_none());
    }
}
