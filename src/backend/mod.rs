//!
//! Defines the storage backend trait and implementations.
//!
//! The `Backend` trait defines the interface for storing and retrieving the four
//! relations of the history: entries, tags, hierarchy edges and associations.
//! This allows the engines (`Store`, `Tags`, `History`) to be independent of the
//! specific storage mechanism.
//!
//! Writes go through a single entry point, `Backend::apply`, which takes a whole
//! change set and applies it atomically: either every change lands or none does.

use crate::entry::{Entry, EntryId, NewEntry};
use crate::tag::{Association, Edge, Tag, TagId};
use crate::{Error, Result};
use std::any::Any;

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryBackend;
pub use sqlite::SqliteBackend;

/// Names a tag inside a change set.
///
/// `Staged(n)` refers to the tag created by the n-th `Change::InsertTag` of the
/// same change set, which lets one change set create a chain of tags and link
/// them before any of their ids are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRef {
    Id(TagId),
    Staged(usize),
}

impl From<TagId> for TagRef {
    fn from(id: TagId) -> Self {
        TagRef::Id(id)
    }
}

/// A single write against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    InsertEntry(NewEntry),
    /// Removes the entry and every association referencing it.
    DeleteEntry(EntryId),
    IncrementWatchCount(EntryId),
    InsertTag {
        name: String,
        description: Option<String>,
    },
    RenameTag {
        tag: TagId,
        name: String,
    },
    DescribeTag {
        tag: TagId,
        description: Option<String>,
    },
    /// Removes the tag, its associations and every edge where it is parent or child.
    DeleteTag(TagId),
    LinkTags {
        parent: TagRef,
        child: TagRef,
    },
    Attach {
        entry: EntryId,
        tag: TagRef,
    },
    Detach {
        entry: EntryId,
        tag: TagId,
    },
}

/// Ids assigned while applying a change set, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    pub entries: Vec<EntryId>,
    pub tags: Vec<TagId>,
}

impl Applied {
    /// Resolves a `TagRef` against the tags inserted so far.
    pub fn resolve(&self, tag: TagRef) -> Result<TagId> {
        match tag {
            TagRef::Id(id) => Ok(id),
            TagRef::Staged(n) => self.tags.get(n).copied().ok_or_else(|| {
                Error::InvalidOperation(format!("staged tag {n} has not been inserted"))
            }),
        }
    }
}

/// Backend trait abstracting the underlying storage mechanism.
///
/// Implementations persist the four relations and enforce their durable
/// constraints on every `apply`: tag names are unique, an (entry, tag) pair is
/// stored once, a tag has at most one parent and no edge closes a cycle.
/// Ids are assigned by the backend and never reused.
///
/// All backend implementations must be `Send` and `Sync` to allow sharing across threads,
/// and implement `Any` to allow for downcasting if needed.
pub trait Backend: Send + Sync + Any {
    /// Retrieves an entry by id, or `Error::EntryNotFound`.
    fn get_entry(&self, id: EntryId) -> Result<Entry>;

    /// All entries, in no particular order.
    fn all_entries(&self) -> Result<Vec<Entry>>;

    /// All tags, in no particular order.
    fn all_tags(&self) -> Result<Vec<Tag>>;

    /// All parent to child edges.
    fn all_edges(&self) -> Result<Vec<Edge>>;

    /// All entry to tag associations.
    fn all_associations(&self) -> Result<Vec<Association>>;

    /// Looks a tag up by its exact name.
    fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        Ok(self.all_tags()?.into_iter().find(|tag| tag.name == name))
    }

    /// Ids of the tags attached to one entry.
    fn tags_of_entry(&self, entry: EntryId) -> Result<Vec<TagId>> {
        Ok(self
            .all_associations()?
            .into_iter()
            .filter(|assoc| assoc.entry == entry)
            .map(|assoc| assoc.tag)
            .collect())
    }

    /// Applies a change set atomically.
    ///
    /// On error nothing from `changes` is visible afterwards.
    ///
    /// # Returns
    /// The ids assigned to inserted entries and tags.
    fn apply(&mut self, changes: &[Change]) -> Result<Applied>;

    /// Returns a reference to the backend instance as a dynamic `Any` type.
    ///
    /// This allows for downcasting to a concrete backend implementation if necessary,
    /// enabling access to implementation-specific methods. Use with caution.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to the backend instance as a dynamic `Any` type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Tag id rendered for errors raised where only the id is known.
pub(crate) fn tag_label(id: TagId) -> String {
    format!("#{id}")
}

pub(crate) fn validate_new_entry(entry: &NewEntry) -> Result<()> {
    if entry.url.trim().is_empty() {
        return Err(Error::InvalidOperation("entry URL must not be empty".into()));
    }
    Ok(())
}
