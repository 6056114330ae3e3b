use crate::backend::{Applied, Backend, Change, tag_label, validate_new_entry};
use crate::entry::{Entry, EntryId};
use crate::tag::{Association, Edge, Tag, TagId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// A simple in-memory backend implementation using ordered maps for storage.
///
/// This backend is suitable for testing, development, or scenarios where
/// data persistence is handled externally (e.g., by saving/loading the
/// entire state to/from a file).
///
/// It provides basic persistence capabilities via `save_to_file` and
/// `load_from_file`, serializing the whole state to JSON. The id counters are
/// part of that state, so ids stay unique across deletes and restarts.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InMemoryBackend {
    entries: BTreeMap<EntryId, Entry>,
    tags: BTreeMap<TagId, Tag>,
    edges: BTreeSet<Edge>,
    associations: BTreeSet<Association>,
    /// Last id handed out; ids start at 1.
    last_entry_id: EntryId,
    last_tag_id: TagId,
}

impl InMemoryBackend {
    /// Creates a new, empty `InMemoryBackend`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves the entire backend state to a specified file as JSON.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the state should be saved.
    ///
    /// # Returns
    /// A `Result` indicating success or an I/O or serialization error.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads the backend state from a specified JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemoryBackend` is returned.
    ///
    /// # Arguments
    /// * `path` - The path to the file from which to load the state.
    ///
    /// # Returns
    /// A `Result` containing the loaded `InMemoryBackend` or an I/O or deserialization error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::new());
        }

        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn tag(&self, id: TagId) -> Result<&Tag> {
        self.tags.get(&id).ok_or_else(|| Error::TagNotFound(tag_label(id)))
    }

    fn name_taken(&self, name: &str, except: Option<TagId>) -> bool {
        self.tags
            .values()
            .any(|tag| tag.name == name && Some(tag.id) != except)
    }

    fn parent_of(&self, child: TagId) -> Option<TagId> {
        self.edges
            .iter()
            .find(|edge| edge.child == child)
            .map(|edge| edge.parent)
    }

    /// True if `ancestor` is `tag` or sits above it.
    fn is_ancestor_or_self(&self, ancestor: TagId, tag: TagId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(tag);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                break;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Applies one change in place. Only ever called on a scratch copy.
    fn apply_one(&mut self, change: &Change, applied: &mut Applied) -> Result<()> {
        match change {
            Change::InsertEntry(new_entry) => {
                validate_new_entry(new_entry)?;
                self.last_entry_id += 1;
                let id = self.last_entry_id;
                self.entries.insert(id, new_entry.clone().into_entry(id));
                applied.entries.push(id);
            }
            Change::DeleteEntry(id) => {
                self.entries.remove(id).ok_or(Error::EntryNotFound(*id))?;
                self.associations.retain(|assoc| assoc.entry != *id);
            }
            Change::IncrementWatchCount(id) => {
                let entry = self.entries.get_mut(id).ok_or(Error::EntryNotFound(*id))?;
                entry.watch_count = entry.watch_count.saturating_add(1);
            }
            Change::InsertTag { name, description } => {
                if self.name_taken(name, None) {
                    return Err(Error::DuplicateName(name.clone()));
                }
                self.last_tag_id += 1;
                let id = self.last_tag_id;
                self.tags.insert(
                    id,
                    Tag {
                        id,
                        name: name.clone(),
                        description: description.clone(),
                    },
                );
                applied.tags.push(id);
            }
            Change::RenameTag { tag, name } => {
                self.tag(*tag)?;
                if self.name_taken(name, Some(*tag)) {
                    return Err(Error::DuplicateName(name.clone()));
                }
                if let Some(stored) = self.tags.get_mut(tag) {
                    stored.name = name.clone();
                }
            }
            Change::DescribeTag { tag, description } => {
                let stored = self
                    .tags
                    .get_mut(tag)
                    .ok_or_else(|| Error::TagNotFound(tag_label(*tag)))?;
                stored.description = description.clone();
            }
            Change::DeleteTag(id) => {
                self.tags
                    .remove(id)
                    .ok_or_else(|| Error::TagNotFound(tag_label(*id)))?;
                self.associations.retain(|assoc| assoc.tag != *id);
                self.edges
                    .retain(|edge| edge.parent != *id && edge.child != *id);
            }
            Change::LinkTags { parent, child } => {
                let parent = applied.resolve(*parent)?;
                let child = applied.resolve(*child)?;
                self.tag(parent)?;
                self.tag(child)?;
                if self.parent_of(child).is_some() {
                    return Err(Error::InvalidOperation(format!(
                        "tag '{}' already has a parent",
                        self.tag(child)?.name
                    )));
                }
                if self.is_ancestor_or_self(child, parent) {
                    return Err(Error::InvalidOperation(format!(
                        "linking '{}' under '{}' would create a cycle",
                        self.tag(child)?.name,
                        self.tag(parent)?.name
                    )));
                }
                self.edges.insert(Edge { parent, child });
            }
            Change::Attach { entry, tag } => {
                let tag = applied.resolve(*tag)?;
                if !self.entries.contains_key(entry) {
                    return Err(Error::EntryNotFound(*entry));
                }
                let name = self.tag(tag)?.name.clone();
                if !self.associations.insert(Association { entry: *entry, tag }) {
                    return Err(Error::DuplicateAssociation {
                        entry: *entry,
                        tag: name,
                    });
                }
            }
            Change::Detach { entry, tag } => {
                if !self.associations.remove(&Association {
                    entry: *entry,
                    tag: *tag,
                }) {
                    let name = self
                        .tags
                        .get(tag)
                        .map(|t| t.name.clone())
                        .unwrap_or_else(|| tag_label(*tag));
                    return Err(Error::AssociationNotFound {
                        entry: *entry,
                        tag: name,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Backend for InMemoryBackend {
    fn get_entry(&self, id: EntryId) -> Result<Entry> {
        self.entries.get(&id).cloned().ok_or(Error::EntryNotFound(id))
    }

    fn all_entries(&self) -> Result<Vec<Entry>> {
        Ok(self.entries.values().cloned().collect())
    }

    fn all_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.tags.values().cloned().collect())
    }

    fn all_edges(&self) -> Result<Vec<Edge>> {
        Ok(self.edges.iter().copied().collect())
    }

    fn all_associations(&self) -> Result<Vec<Association>> {
        Ok(self.associations.iter().copied().collect())
    }

    fn tags_of_entry(&self, entry: EntryId) -> Result<Vec<TagId>> {
        Ok(self
            .associations
            .range(Association { entry, tag: TagId::MIN }..=Association { entry, tag: TagId::MAX })
            .map(|assoc| assoc.tag)
            .collect())
    }

    /// Applies the change set to a scratch copy and swaps it in on success.
    fn apply(&mut self, changes: &[Change]) -> Result<Applied> {
        let mut scratch = self.clone();
        let mut applied = Applied::default();
        for change in changes {
            scratch.apply_one(change, &mut applied)?;
        }
        *self = scratch;
        Ok(applied)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
