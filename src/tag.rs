//! Tags and the two relations built over them.

use crate::entry::EntryId;
use serde::{Deserialize, Serialize};

/// Identifier of a tag. Assigned by the backend, monotonic, never reused.
pub type TagId = i64;

/// A named taxonomy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Unique across all tags, compared exactly as stored.
    pub name: String,
    pub description: Option<String>,
}

/// A parent to child link between two tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub parent: TagId,
    pub child: TagId,
}

/// A link between one entry and one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Association {
    pub entry: EntryId,
    pub tag: TagId,
}
