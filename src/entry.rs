//! Recorded URL entries.
//!
//! An `Entry` is one row of the history: a URL seen on the clipboard (or saved
//! by hand) together with its title, platform, creation time and the number of
//! times it has been played.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an entry. Assigned by the backend, monotonic, never reused.
pub type EntryId = i64;

/// A recorded URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub url: String,
    /// May be empty when the title could not be resolved.
    pub title: String,
    pub platform: String,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    pub watch_count: u32,
}

impl Entry {
    /// True if the entry has never been played.
    pub fn is_unwatched(&self) -> bool {
        self.watch_count == 0
    }
}

/// The data needed to record a new entry; the backend assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub url: String,
    pub title: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

impl NewEntry {
    /// A new entry stamped with the current time.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self::at(url, title, platform, Utc::now())
    }

    /// A new entry with an explicit creation time.
    pub fn at(
        url: impl Into<String>,
        title: impl Into<String>,
        platform: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            platform: platform.into(),
            created_at,
        }
    }

    pub(crate) fn into_entry(self, id: EntryId) -> Entry {
        Entry {
            id,
            url: self.url,
            title: self.title,
            platform: self.platform,
            created_at: self.created_at,
            watch_count: 0,
        }
    }
}
