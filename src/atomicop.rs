use crate::backend::{Applied, Backend, Change, TagRef};
use crate::hierarchy::Hierarchy;
use crate::Result;
use std::sync::RwLockWriteGuard;

/// Represents a single, atomic transaction against a `Store`.
///
/// An `AtomicOp` holds the store's write lock for its whole lifetime, so the
/// state it reads through `backend()` cannot change underneath it. Changes are
/// staged with `stage` and only reach the backend on `commit()`, which applies
/// the whole change set atomically. Dropping an uncommitted operation discards
/// everything staged.
///
/// `AtomicOp` instances are created via `Store::new_operation()`.
pub struct AtomicOp<'a> {
    backend: RwLockWriteGuard<'a, Box<dyn Backend>>,
    changes: Vec<Change>,
    /// Number of `InsertTag` changes staged so far.
    staged_tags: usize,
}

impl<'a> AtomicOp<'a> {
    pub(crate) fn new(backend: RwLockWriteGuard<'a, Box<dyn Backend>>) -> Self {
        Self {
            backend,
            changes: Vec::new(),
            staged_tags: 0,
        }
    }

    /// The committed state, as of when the operation began.
    ///
    /// Staged changes are not visible here.
    pub fn backend(&self) -> &dyn Backend {
        &**self.backend
    }

    /// Snapshot of the committed tag forest.
    pub fn hierarchy(&self) -> Result<Hierarchy> {
        Hierarchy::load(self.backend())
    }

    /// Stages a change.
    ///
    /// # Returns
    /// For `Change::InsertTag`, a `TagRef` that later changes of this operation
    /// can use to name the new tag; `None` otherwise.
    pub fn stage(&mut self, change: Change) -> Option<TagRef> {
        let staged = match change {
            Change::InsertTag { .. } => {
                let tag = TagRef::Staged(self.staged_tags);
                self.staged_tags += 1;
                Some(tag)
            }
            _ => None,
        };
        self.changes.push(change);
        staged
    }

    /// Stages a new tag and returns its reference.
    pub fn stage_tag(&mut self, name: impl Into<String>, description: Option<String>) -> TagRef {
        let tag = TagRef::Staged(self.staged_tags);
        self.staged_tags += 1;
        self.changes.push(Change::InsertTag {
            name: name.into(),
            description,
        });
        tag
    }

    /// The changes staged so far, in order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// True while nothing has been staged; committing then touches no storage.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Commits the operation, applying every staged change as one unit.
    ///
    /// This operation consumes the `AtomicOp` instance and releases the write lock.
    ///
    /// # Returns
    /// The ids assigned to inserted entries and tags. On error the backend is unchanged.
    pub fn commit(mut self) -> Result<Applied> {
        if self.is_empty() {
            return Ok(Applied::default());
        }
        self.backend.apply(&self.changes)
    }
}
