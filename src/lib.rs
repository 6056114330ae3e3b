//!
//! Clipstash: a tagged history of the URLs that pass through your clipboard.
//! This library provides the storage, tag taxonomy and query engine behind it.
//!
//! ## Core Concepts
//!
//! * **Entries (`entry::Entry`)**: One recorded URL with its title, platform, creation time and watch counter.
//! * **Tags (`tag::Tag`)**: Named taxonomy nodes. Each tag has at most one parent, so the tags form a forest.
//! * **Associations (`tag::Association`)**: Many-to-many links between entries and tags.
//! * **Backends (`backend::Backend`)**: A pluggable storage layer holding the four relations and applying change sets atomically.
//! * **Store (`store::Store`)**: The shared handle over a backend. Serializes writers, lets readers proceed together.
//! * **Hierarchy (`hierarchy::Hierarchy`)**: An arena snapshot of the tag forest used for ancestor paths and closure expansion.
//! * **Tags engine (`tags::Tags`)**: Creates, renames, describes and deletes tags; attaches and detaches them from entries.
//! * **History (`query::History`)**: Composes search, tag, platform, watch-count and date filters into one ordered result.

pub mod atomicop;
pub mod backend;
pub mod config;
pub mod constants;
pub mod entry;
pub mod hierarchy;
pub mod query;
pub mod store;
pub mod tag;
pub mod tags;
pub mod text;

pub use entry::{Entry, EntryId, NewEntry};
pub use hierarchy::{Hierarchy, TagNode};
pub use query::{Criteria, History, HistoryItem, QueryOutcome};
pub use store::Store;
pub use tag::{Tag, TagId};
pub use tags::Tags;

/// Result type used throughout the Clipstash library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Clipstash library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("A tag named '{0}' already exists")]
    DuplicateName(String),

    /// The parent named at tag creation does not exist
    #[error("Parent tag not found: {0}")]
    ParentNotFound(String),

    #[error("Entry {entry} is already tagged '{tag}'")]
    DuplicateAssociation { entry: EntryId, tag: String },

    #[error("Entry {entry} is not tagged '{tag}'")]
    AssociationNotFound { entry: EntryId, tag: String },

    /// Malformed query input, reported before any storage access
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for the errors that report a missing entry or tag.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound(_) | Error::TagNotFound(_))
    }
}
