//! The tag mutation engine.
//!
//! `Tags` creates, renames, describes and deletes tags and attaches them to
//! entries. Every call validates against the committed state while holding the
//! store's write lock and then commits its changes as one atomic unit, so a
//! failure part-way leaves nothing behind. Tag names are trimmed both when they
//! are stored and when they are looked up.

use crate::backend::{Change, TagRef};
use crate::constants::PATH_SEPARATOR;
use crate::entry::EntryId;
use crate::hierarchy::TagNode;
use crate::store::Store;
use crate::tag::{Tag, TagId};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Trims a tag name and rejects empty names and names holding the path separator.
fn clean_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidOperation("tag name must not be empty".into()));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::InvalidOperation(format!(
            "tag name '{name}' must not contain '{PATH_SEPARATOR}'"
        )));
    }
    Ok(name)
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// Handle on the tag mutation engine, obtained from `Store::tags()`.
#[derive(Clone)]
pub struct Tags {
    store: Store,
}

impl Tags {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a tag, optionally under an existing parent.
    ///
    /// The tag and its parent edge are committed together.
    ///
    /// # Errors
    /// * `Error::DuplicateName` if a tag with this name exists.
    /// * `Error::ParentNotFound` if `parent` names no tag; nothing is created.
    pub fn create(
        &self,
        name: &str,
        parent: Option<&str>,
        description: Option<&str>,
    ) -> Result<TagId> {
        let name = clean_name(name)?;
        let mut op = self.store.new_operation()?;
        let hierarchy = op.hierarchy()?;

        if hierarchy.tag_by_name(name).is_some() {
            return Err(Error::DuplicateName(name.to_string()));
        }
        let parent_id = match parent {
            Some(parent) => {
                let parent = parent.trim();
                let tag = hierarchy
                    .tag_by_name(parent)
                    .ok_or_else(|| Error::ParentNotFound(parent.to_string()))?;
                Some(tag.id)
            }
            None => None,
        };

        let child = op.stage_tag(name, clean_description(description));
        if let Some(parent) = parent_id {
            op.stage(Change::LinkTags {
                parent: TagRef::Id(parent),
                child,
            });
        }
        let applied = op.commit()?;
        let id = applied.resolve(child)?;
        info!(tag = id, name, parent = ?parent, "created tag");
        Ok(id)
    }

    /// Renames a tag. Renaming a tag to its current name is a no-op.
    ///
    /// # Errors
    /// * `Error::TagNotFound` if `name` names no tag.
    /// * `Error::DuplicateName` if another tag already uses `new_name`.
    pub fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        let name = name.trim();
        let new_name = clean_name(new_name)?;
        let mut op = self.store.new_operation()?;
        let hierarchy = op.hierarchy()?;

        let tag = hierarchy
            .tag_by_name(name)
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        match hierarchy.tag_by_name(new_name) {
            Some(other) if other.id != tag.id => {
                return Err(Error::DuplicateName(new_name.to_string()));
            }
            Some(_) => return Ok(()),
            None => {}
        }

        let id = tag.id;
        op.stage(Change::RenameTag {
            tag: id,
            name: new_name.to_string(),
        });
        op.commit()?;
        info!(tag = id, from = name, to = new_name, "renamed tag");
        Ok(())
    }

    /// Sets or clears (`None` or blank) a tag's description.
    pub fn describe(&self, name: &str, description: Option<&str>) -> Result<()> {
        let name = name.trim();
        let mut op = self.store.new_operation()?;
        let tag = op
            .hierarchy()?
            .tag_by_name(name)
            .map(|tag| tag.id)
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        op.stage(Change::DescribeTag {
            tag,
            description: clean_description(description),
        });
        op.commit()?;
        info!(tag, name, "updated tag description");
        Ok(())
    }

    /// Deletes a tag with its associations and hierarchy edges.
    ///
    /// Former children are not re-attached anywhere; they become roots.
    pub fn delete(&self, name: &str) -> Result<()> {
        let name = name.trim();
        let mut op = self.store.new_operation()?;
        let hierarchy = op.hierarchy()?;
        let tag = hierarchy
            .tag_by_name(name)
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        let id = tag.id;
        let orphaned = hierarchy.children(id).len();

        op.stage(Change::DeleteTag(id));
        op.commit()?;
        info!(tag = id, name, orphaned, "deleted tag");
        Ok(())
    }

    /// Attaches a tag to an entry.
    ///
    /// # Errors
    /// * `Error::TagNotFound` / `Error::EntryNotFound` for a missing side.
    /// * `Error::DuplicateAssociation` if the entry already carries the tag.
    pub fn attach(&self, entry: EntryId, name: &str) -> Result<()> {
        let name = name.trim();
        let mut op = self.store.new_operation()?;
        let tag = op
            .hierarchy()?
            .tag_by_name(name)
            .map(|tag| tag.id)
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        op.backend().get_entry(entry)?;
        if op.backend().tags_of_entry(entry)?.contains(&tag) {
            return Err(Error::DuplicateAssociation {
                entry,
                tag: name.to_string(),
            });
        }

        op.stage(Change::Attach {
            entry,
            tag: TagRef::Id(tag),
        });
        op.commit()?;
        info!(entry, tag = name, "attached tag");
        Ok(())
    }

    /// Detaches a tag from an entry.
    ///
    /// # Errors
    /// * `Error::TagNotFound` / `Error::EntryNotFound` for a missing side.
    /// * `Error::AssociationNotFound` if the entry does not carry the tag.
    pub fn detach(&self, entry: EntryId, name: &str) -> Result<()> {
        let name = name.trim();
        let mut op = self.store.new_operation()?;
        let tag = op
            .hierarchy()?
            .tag_by_name(name)
            .map(|tag| tag.id)
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        op.backend().get_entry(entry)?;
        if !op.backend().tags_of_entry(entry)?.contains(&tag) {
            return Err(Error::AssociationNotFound {
                entry,
                tag: name.to_string(),
            });
        }

        op.stage(Change::Detach { entry, tag });
        op.commit()?;
        info!(entry, tag = name, "detached tag");
        Ok(())
    }

    /// Files an entry under a slash-separated path such as "Science/Archaeology".
    ///
    /// Walks the segments left to right, creating missing tags under the previous
    /// segment. An existing tag is reused; when it is a root it is also linked
    /// under the previous segment, unless that would close a cycle. An existing
    /// tag that already has another parent stays where it is. The entry is
    /// then attached to the last segment's tag only. Applying the same path twice
    /// changes nothing the second time. All created tags, their edges and the
    /// attachment commit together.
    ///
    /// # Returns
    /// The id of the last segment's tag.
    pub fn assign_path(&self, entry: EntryId, path: &str) -> Result<TagId> {
        let segments: Vec<&str> = path
            .split(PATH_SEPARATOR)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "suggested path '{path}' has no tag names"
            )));
        }

        let mut op = self.store.new_operation()?;
        op.backend().get_entry(entry)?;
        let hierarchy = op.hierarchy()?;

        let mut staged: HashMap<&str, TagRef> = HashMap::new();
        // Committed tags on the path so far and everything above them. An
        // existing root is only linked under the previous segment when it is
        // not in this set, since that would close a cycle.
        let mut above: HashSet<TagId> = HashSet::new();
        let mut linked = 0;
        let mut previous: Option<TagRef> = None;
        for segment in segments {
            let current = if let Some(tag) = hierarchy.tag_by_name(segment) {
                let id = tag.id;
                if let Some(parent) = previous {
                    match hierarchy.parent(id) {
                        Some(existing) if parent == TagRef::Id(existing) => {}
                        None if !above.contains(&id) => {
                            op.stage(Change::LinkTags {
                                parent,
                                child: TagRef::Id(id),
                            });
                            linked += 1;
                        }
                        None if parent == TagRef::Id(id) => {}
                        None => {
                            warn!(tag = segment, path, "not linking tag that would close a cycle");
                        }
                        Some(_) => {
                            warn!(
                                tag = segment,
                                path,
                                "reusing existing tag that lives under a different parent"
                            );
                        }
                    }
                }
                above.insert(id);
                above.extend(hierarchy.ancestor_closure(id));
                TagRef::Id(id)
            } else if let Some(tag) = staged.get(segment) {
                *tag
            } else {
                let tag = op.stage_tag(segment, None);
                if let Some(parent) = previous {
                    op.stage(Change::LinkTags { parent, child: tag });
                }
                staged.insert(segment, tag);
                tag
            };
            previous = Some(current);
        }

        let Some(last) = previous else {
            return Err(Error::InvalidOperation(format!(
                "suggested path '{path}' has no tag names"
            )));
        };
        let already_attached = match last {
            TagRef::Id(id) => op.backend().tags_of_entry(entry)?.contains(&id),
            TagRef::Staged(_) => false,
        };
        if !already_attached {
            op.stage(Change::Attach { entry, tag: last });
        }

        let created = staged.len();
        let applied = op.commit()?;
        let id = applied.resolve(last)?;
        info!(entry, path, tag = id, created, linked, "assigned suggested path");
        Ok(id)
    }

    /// Looks a tag up by name, ignoring surrounding whitespace.
    pub fn get(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        self.store
            .read_backend()?
            .find_tag(name)?
            .ok_or_else(|| Error::TagNotFound(name.to_string()))
    }

    /// All tags ordered by name.
    pub fn list(&self) -> Result<Vec<Tag>> {
        let hierarchy = self.store.hierarchy()?;
        Ok(hierarchy.tags().into_iter().cloned().collect())
    }

    /// Root-first names of the path to `name`, ending with `name`.
    pub fn path(&self, name: &str) -> Result<Vec<String>> {
        self.store.hierarchy()?.ancestor_path(name.trim())
    }

    /// The tag forest for display.
    pub fn forest(&self) -> Result<Vec<TagNode>> {
        Ok(self.store.hierarchy()?.forest())
    }

    /// Full paths of the tags attached to one entry, sorted.
    pub fn for_entry(&self, entry: EntryId) -> Result<Vec<String>> {
        let backend = self.store.read_backend()?;
        backend.get_entry(entry)?;
        let hierarchy = crate::hierarchy::Hierarchy::load(&**backend)?;
        let mut paths: Vec<String> = backend
            .tags_of_entry(entry)?
            .into_iter()
            .filter_map(|id| hierarchy.path_string(id))
            .collect();
        paths.sort();
        Ok(paths)
    }
}
