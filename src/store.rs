//!
//! Provides the main database handle (`Store`).
//!
//! `Store` owns the storage `Backend` behind a read/write lock and is the single
//! entry point for reads and writes. The tag engine (`Tags`) and the history
//! query engine (`History`) are handed out by the store and share its backend.

use crate::atomicop::AtomicOp;
use crate::backend::{Backend, Change};
use crate::entry::{Entry, EntryId, NewEntry};
use crate::hierarchy::Hierarchy;
use crate::query::History;
use crate::tags::Tags;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Database implementation on top of the backend.
///
/// Cloning a `Store` is cheap and yields another handle to the same backend.
/// Readers share the lock; every mutation holds the write lock from validation
/// through commit, so concurrent writers are serialized.
#[derive(Clone)]
pub struct Store {
    /// The backend used by the database.
    backend: Arc<RwLock<Box<dyn Backend>>>,
}

impl Store {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend: Arc::new(RwLock::new(backend)),
        }
    }

    /// Helper function to take the shared read lock.
    pub(crate) fn read_backend(&self) -> Result<RwLockReadGuard<'_, Box<dyn Backend>>> {
        self.backend
            .read()
            .map_err(|_| Error::Io(std::io::Error::other("Failed to lock backend")))
    }

    fn write_backend(&self) -> Result<RwLockWriteGuard<'_, Box<dyn Backend>>> {
        self.backend
            .write()
            .map_err(|_| Error::Io(std::io::Error::other("Failed to lock backend")))
    }

    /// Runs `f` against the backend under the read lock.
    pub fn with_backend<R>(&self, f: impl FnOnce(&dyn Backend) -> R) -> Result<R> {
        let guard = self.read_backend()?;
        Ok(f(&**guard))
    }

    /// Starts an atomic operation, taking the write lock until it commits or drops.
    pub fn new_operation(&self) -> Result<AtomicOp<'_>> {
        Ok(AtomicOp::new(self.write_backend()?))
    }

    /// The tag mutation engine over this store.
    pub fn tags(&self) -> Tags {
        Tags::new(self.clone())
    }

    /// The history query engine over this store.
    pub fn history(&self) -> History {
        History::new(self.clone())
    }

    /// Snapshot of the current tag forest.
    pub fn hierarchy(&self) -> Result<Hierarchy> {
        let guard = self.read_backend()?;
        Hierarchy::load(&**guard)
    }

    /// Records a URL seen now.
    ///
    /// Deduplication is left to the caller; see `find_entry_by_url`.
    pub fn create_entry(&self, url: &str, title: &str, platform: &str) -> Result<EntryId> {
        self.create_entry_at(NewEntry::new(url, title, platform))
    }

    /// Records a URL with an explicit creation time.
    pub fn create_entry_at(&self, entry: NewEntry) -> Result<EntryId> {
        let url = entry.url.clone();
        let mut op = self.new_operation()?;
        op.stage(Change::InsertEntry(entry));
        let applied = op.commit()?;
        let id = applied
            .entries
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidOperation("backend assigned no entry id".into()))?;
        info!(entry = id, url = %url, "recorded entry");
        Ok(id)
    }

    pub fn get_entry(&self, id: EntryId) -> Result<Entry> {
        self.read_backend()?.get_entry(id)
    }

    /// The most recent entry recorded for exactly this URL.
    pub fn find_entry_by_url(&self, url: &str) -> Result<Option<Entry>> {
        let entries = self.read_backend()?.all_entries()?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.url == url)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))))
    }

    /// Bumps the watch counter after a successful playback.
    ///
    /// # Returns
    /// The new watch count.
    pub fn increment_watch_count(&self, id: EntryId) -> Result<u32> {
        let mut op = self.new_operation()?;
        let before = op.backend().get_entry(id)?.watch_count;
        op.stage(Change::IncrementWatchCount(id));
        op.commit()?;
        let count = before.saturating_add(1);
        info!(entry = id, count, "marked entry watched");
        Ok(count)
    }

    /// Removes an entry and its tag associations.
    pub fn delete_entry(&self, id: EntryId) -> Result<()> {
        let mut op = self.new_operation()?;
        op.stage(Change::DeleteEntry(id));
        op.commit()?;
        info!(entry = id, "removed entry");
        Ok(())
    }

    /// Distinct non-empty platform names, sorted.
    pub fn platforms(&self) -> Result<Vec<String>> {
        let entries = self.read_backend()?.all_entries()?;
        let platforms: BTreeSet<String> = entries
            .into_iter()
            .map(|entry| entry.platform)
            .filter(|platform| !platform.trim().is_empty())
            .collect();
        Ok(platforms.into_iter().collect())
    }
}
