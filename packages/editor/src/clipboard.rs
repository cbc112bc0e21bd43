//! # Clipboard
//!
//! Copy/cut/paste capture a block together with its whole subtree as a
//! value snapshot. The snapshot lives in a [`ClipboardStore`], a durable
//! side-channel independent of the tree and its history, so it survives
//! undo, redo and page reloads.
//!
//! Entries are stamped when captured and treated as absent once older than
//! the TTL. Expiry is judged lazily on every read; nothing runs in the
//! background and an expired entry stays in storage until overwritten or
//! cleared.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pagecraft_common::{read_json, write_json, Clock, CommonError, FileSystem, RealFileSystem};
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};
use crate::errors::EditorError;
use crate::store::BlockStore;

/// How long a copied subtree stays pasteable
pub const DEFAULT_CLIPBOARD_TTL: Duration = Duration::from_secs(60 * 60);

/// A captured subtree. The first block is the root; its `parent_id` is
/// cleared so the entry is self-contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardEntry {
    pub blocks: Vec<Block>,
    pub copied_at: DateTime<Utc>,
}

impl ClipboardEntry {
    /// Deep-copy `id` and its descendants out of the store
    pub fn capture(store: &BlockStore, id: &BlockId, copied_at: DateTime<Utc>) -> Option<Self> {
        let mut blocks: Vec<Block> = store.descendants_of(id).into_iter().cloned().collect();
        let root = blocks.first_mut()?;
        root.parent_id = None;
        root.sort_order = 0;

        Some(Self { blocks, copied_at })
    }

    pub fn root(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Older than `ttl` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.copied_at).num_milliseconds();
        age > i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Durable clipboard side-channel
pub trait ClipboardStore: Send + Sync {
    fn read(&self) -> Result<Option<ClipboardEntry>, EditorError>;

    fn write(&self, entry: &ClipboardEntry) -> Result<(), EditorError>;

    fn clear(&self) -> Result<(), EditorError>;
}

/// Process-local store. Clones share one slot, so several sessions in the
/// same process see the same clipboard.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboardStore {
    slot: Arc<Mutex<Option<ClipboardEntry>>>,
}

impl MemoryClipboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<MutexGuard<'_, Option<ClipboardEntry>>, EditorError> {
        self.slot
            .lock()
            .map_err(|_| EditorError::ClipboardStorage("clipboard lock poisoned".to_string()))
    }
}

impl ClipboardStore for MemoryClipboardStore {
    fn read(&self) -> Result<Option<ClipboardEntry>, EditorError> {
        Ok(self.slot()?.clone())
    }

    fn write(&self, entry: &ClipboardEntry) -> Result<(), EditorError> {
        *self.slot()? = Some(entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), EditorError> {
        *self.slot()? = None;
        Ok(())
    }
}

/// JSON file store that survives reloads
pub struct FileClipboardStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileClipboardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_file_system(path, Arc::new(RealFileSystem))
    }

    pub fn with_file_system(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for FileClipboardStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileClipboardStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ClipboardStore for FileClipboardStore {
    fn read(&self) -> Result<Option<ClipboardEntry>, EditorError> {
        Ok(read_json(self.fs.as_ref(), &self.path)?)
    }

    fn write(&self, entry: &ClipboardEntry) -> Result<(), EditorError> {
        Ok(write_json(self.fs.as_ref(), &self.path, entry)?)
    }

    fn clear(&self) -> Result<(), EditorError> {
        self.fs
            .remove(&self.path)
            .map_err(|e| EditorError::Common(CommonError::Io(e)))
    }
}

/// Clipboard subsystem: a store, a clock and a TTL
#[derive(Clone)]
pub struct Clipboard {
    store: Arc<dyn ClipboardStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl Clipboard {
    pub fn new(store: Arc<dyn ClipboardStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Snapshot `id` and its subtree, stamped with the current time
    pub fn capture(&self, blocks: &BlockStore, id: &BlockId) -> Option<ClipboardEntry> {
        ClipboardEntry::capture(blocks, id, self.clock.now())
    }

    pub fn put(&self, entry: &ClipboardEntry) -> Result<(), EditorError> {
        self.store.write(entry)
    }

    /// The stored entry, unless absent or expired
    pub fn current(&self) -> Result<Option<ClipboardEntry>, EditorError> {
        let now = self.clock.now();
        Ok(self
            .store
            .read()?
            .filter(|entry| !entry.is_expired(now, self.ttl)))
    }

    pub fn has_content(&self) -> bool {
        matches!(self.current(), Ok(Some(_)))
    }

    pub fn clear(&self) -> Result<(), EditorError> {
        self.store.clear()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clipboard")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
