//! SQLite-backed store.
//!
//! The table layout matches the database the clipboard tool has always written
//! (`streaming_history`, `tags`, `tag_hierarchy`, `url_tags`), so an existing
//! history opens in place. Each change set runs inside one transaction.

use crate::backend::{Applied, Backend, Change, tag_label, validate_new_entry};
use crate::constants::TIMESTAMP_FORMAT;
use crate::entry::{Entry, EntryId};
use crate::tag::{Association, Edge, Tag, TagId};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::any::Any;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS streaming_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    title TEXT,
    platform TEXT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    visto INTEGER DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_history_timestamp ON streaming_history(timestamp);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS tag_hierarchy (
    parent_id INTEGER NOT NULL,
    child_id INTEGER NOT NULL UNIQUE,
    PRIMARY KEY (parent_id, child_id)
);

CREATE TABLE IF NOT EXISTS url_tags (
    url_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (url_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_url_tags_tag ON url_tags(tag_id);
";

const ENTRY_COLUMNS: &str = "id, url, title, platform, timestamp, visto";

/// A backend persisting to a SQLite database file.
///
/// The connection sits behind a `Mutex` so the backend can be shared across
/// threads; the `Store` lock already serializes writers.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Opens or creates a database file, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    /// An in-memory database, discarded when the backend drops.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        migrate_watch_count(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("Failed to lock SQLite connection")))
    }
}

/// Databases written before the watch counter existed lack the `visto` column.
fn migrate_watch_count(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(streaming_history)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if !columns.iter().any(|c| c == "visto") {
        conn.execute_batch("ALTER TABLE streaming_history ADD COLUMN visto INTEGER DEFAULT 0;")?;
        info!("added watch counter column to streaming_history");
    }
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .ok()
        })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let raw_ts: Option<String> = row.get(4)?;
    let created_at = raw_ts
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_default();
    let watch_count: Option<i64> = row.get(5)?;
    Ok(Entry {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        platform: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        created_at,
        watch_count: u32::try_from(watch_count.unwrap_or(0).max(0)).unwrap_or(u32::MAX),
    })
}

fn row_to_tag(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn entry_exists(conn: &Connection, id: EntryId) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM streaming_history WHERE id = ?1",
            params![id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn tag_name(conn: &Connection, id: TagId) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT name FROM tags WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?)
}

fn require_tag(conn: &Connection, id: TagId) -> Result<String> {
    tag_name(conn, id)?.ok_or_else(|| Error::TagNotFound(tag_label(id)))
}

fn name_taken(conn: &Connection, name: &str, except: Option<TagId>) -> Result<bool> {
    let found: Option<TagId> = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(matches!(found, Some(id) if Some(id) != except))
}

fn parent_of(conn: &Connection, child: TagId) -> Result<Option<TagId>> {
    Ok(conn
        .query_row(
            "SELECT parent_id FROM tag_hierarchy WHERE child_id = ?1",
            params![child],
            |row| row.get(0),
        )
        .optional()?)
}

fn is_ancestor_or_self(conn: &Connection, ancestor: TagId, tag: TagId) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut current = Some(tag);
    while let Some(id) = current {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            break;
        }
        current = parent_of(conn, id)?;
    }
    Ok(false)
}

fn apply_one(conn: &Connection, change: &Change, applied: &mut Applied) -> Result<()> {
    match change {
        Change::InsertEntry(new_entry) => {
            validate_new_entry(new_entry)?;
            conn.execute(
                "INSERT INTO streaming_history (url, title, platform, timestamp, visto)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![
                    new_entry.url,
                    new_entry.title,
                    new_entry.platform,
                    format_timestamp(&new_entry.created_at)
                ],
            )?;
            applied.entries.push(conn.last_insert_rowid());
        }
        Change::DeleteEntry(id) => {
            if !entry_exists(conn, *id)? {
                return Err(Error::EntryNotFound(*id));
            }
            conn.execute("DELETE FROM url_tags WHERE url_id = ?1", params![id])?;
            conn.execute("DELETE FROM streaming_history WHERE id = ?1", params![id])?;
        }
        Change::IncrementWatchCount(id) => {
            let updated = conn.execute(
                "UPDATE streaming_history SET visto = COALESCE(visto, 0) + 1 WHERE id = ?1",
                params![id],
            )?;
            if updated == 0 {
                return Err(Error::EntryNotFound(*id));
            }
        }
        Change::InsertTag { name, description } => {
            if name_taken(conn, name, None)? {
                return Err(Error::DuplicateName(name.clone()));
            }
            conn.execute(
                "INSERT INTO tags (name, description) VALUES (?1, ?2)",
                params![name, description],
            )?;
            applied.tags.push(conn.last_insert_rowid());
        }
        Change::RenameTag { tag, name } => {
            require_tag(conn, *tag)?;
            if name_taken(conn, name, Some(*tag))? {
                return Err(Error::DuplicateName(name.clone()));
            }
            conn.execute(
                "UPDATE tags SET name = ?1 WHERE id = ?2",
                params![name, tag],
            )?;
        }
        Change::DescribeTag { tag, description } => {
            let updated = conn.execute(
                "UPDATE tags SET description = ?1 WHERE id = ?2",
                params![description, tag],
            )?;
            if updated == 0 {
                return Err(Error::TagNotFound(tag_label(*tag)));
            }
        }
        Change::DeleteTag(id) => {
            require_tag(conn, *id)?;
            conn.execute("DELETE FROM url_tags WHERE tag_id = ?1", params![id])?;
            conn.execute(
                "DELETE FROM tag_hierarchy WHERE parent_id = ?1 OR child_id = ?1",
                params![id],
            )?;
            conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        }
        Change::LinkTags { parent, child } => {
            let parent = applied.resolve(*parent)?;
            let child = applied.resolve(*child)?;
            let parent_name = require_tag(conn, parent)?;
            let child_name = require_tag(conn, child)?;
            if parent_of(conn, child)?.is_some() {
                return Err(Error::InvalidOperation(format!(
                    "tag '{child_name}' already has a parent"
                )));
            }
            if is_ancestor_or_self(conn, child, parent)? {
                return Err(Error::InvalidOperation(format!(
                    "linking '{child_name}' under '{parent_name}' would create a cycle"
                )));
            }
            conn.execute(
                "INSERT INTO tag_hierarchy (parent_id, child_id) VALUES (?1, ?2)",
                params![parent, child],
            )?;
        }
        Change::Attach { entry, tag } => {
            let tag = applied.resolve(*tag)?;
            if !entry_exists(conn, *entry)? {
                return Err(Error::EntryNotFound(*entry));
            }
            let name = require_tag(conn, tag)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO url_tags (url_id, tag_id) VALUES (?1, ?2)",
                params![entry, tag],
            )?;
            if inserted == 0 {
                return Err(Error::DuplicateAssociation {
                    entry: *entry,
                    tag: name,
                });
            }
        }
        Change::Detach { entry, tag } => {
            let removed = conn.execute(
                "DELETE FROM url_tags WHERE url_id = ?1 AND tag_id = ?2",
                params![entry, tag],
            )?;
            if removed == 0 {
                let name = tag_name(conn, *tag)?.unwrap_or_else(|| tag_label(*tag));
                return Err(Error::AssociationNotFound {
                    entry: *entry,
                    tag: name,
                });
            }
        }
    }
    Ok(())
}

impl Backend for SqliteBackend {
    fn get_entry(&self, id: EntryId) -> Result<Entry> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM streaming_history WHERE id = ?1"),
            params![id],
            row_to_entry,
        )
        .optional()?
        .ok_or(Error::EntryNotFound(id))
    }

    fn all_entries(&self) -> Result<Vec<Entry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM streaming_history"))?;
        let rows = stmt
            .query_map([], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn all_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, description FROM tags")?;
        let rows = stmt
            .query_map([], row_to_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn all_edges(&self) -> Result<Vec<Edge>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT parent_id, child_id FROM tag_hierarchy")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Edge {
                    parent: row.get(0)?,
                    child: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn all_associations(&self) -> Result<Vec<Association>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT url_id, tag_id FROM url_tags")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Association {
                    entry: row.get(0)?,
                    tag: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, description FROM tags WHERE name = ?1",
                params![name],
                row_to_tag,
            )
            .optional()?)
    }

    fn tags_of_entry(&self, entry: EntryId) -> Result<Vec<TagId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT tag_id FROM url_tags WHERE url_id = ?1")?;
        let rows = stmt
            .query_map(params![entry], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Runs the change set inside one transaction; any error rolls it back.
    fn apply(&mut self, changes: &[Change]) -> Result<Applied> {
        let conn = self
            .conn
            .get_mut()
            .map_err(|_| Error::Io(std::io::Error::other("Failed to lock SQLite connection")))?;
        let tx = conn.transaction()?;
        let mut applied = Applied::default();
        for change in changes {
            apply_one(&tx, change, &mut applied)?;
        }
        tx.commit()?;
        debug!(changes = changes.len(), "committed SQLite transaction");
        Ok(applied)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
