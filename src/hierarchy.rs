//! The tag forest, resolved in memory.
//!
//! `Hierarchy` is an arena snapshot of the tags and their parent edges. It answers
//! the questions both engines ask of the taxonomy: the root-first path of a tag,
//! and the closure of tags above or below it. Every traversal is iterative with
//! a visited set, so deep chains cannot exhaust the stack and a damaged edge
//! set cannot loop forever.

use crate::backend::Backend;
use crate::constants::PATH_SEPARATOR;
use crate::tag::{Edge, Tag, TagId};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

#[derive(Debug, Clone)]
struct Node {
    tag: Tag,
    parent: Option<usize>,
    /// Sorted by tag name.
    children: Vec<usize>,
}

/// One tag in the forest view, with its depth and its children.
///
/// Presentation (indentation, markers) is left to the caller; names are
/// returned exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagNode {
    pub id: TagId,
    pub name: String,
    pub description: Option<String>,
    /// 0 for roots.
    pub depth: usize,
    pub children: Vec<TagNode>,
}

/// Arena of tag nodes indexed by id and by name.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    nodes: Vec<Node>,
    by_id: HashMap<TagId, usize>,
    by_name: HashMap<String, usize>,
}

impl Hierarchy {
    /// Builds the arena from the tag and edge relations.
    ///
    /// Edges that reference unknown tags, give a tag a second parent or would
    /// close a cycle are skipped with a warning; backends never write them.
    pub fn from_parts(tags: Vec<Tag>, mut edges: Vec<Edge>) -> Self {
        let mut hierarchy = Hierarchy::default();
        for tag in tags {
            let idx = hierarchy.nodes.len();
            hierarchy.by_id.insert(tag.id, idx);
            hierarchy.by_name.insert(tag.name.clone(), idx);
            hierarchy.nodes.push(Node {
                tag,
                parent: None,
                children: Vec::new(),
            });
        }

        edges.sort();
        for edge in edges {
            let (Some(&parent), Some(&child)) =
                (hierarchy.by_id.get(&edge.parent), hierarchy.by_id.get(&edge.child))
            else {
                warn!(parent = edge.parent, child = edge.child, "skipping edge to unknown tag");
                continue;
            };
            if hierarchy.nodes[child].parent.is_some() {
                warn!(parent = edge.parent, child = edge.child, "skipping second parent edge");
                continue;
            }
            if hierarchy.is_ancestor_or_self(child, parent) {
                warn!(parent = edge.parent, child = edge.child, "skipping edge that closes a cycle");
                continue;
            }
            hierarchy.nodes[child].parent = Some(parent);
            hierarchy.nodes[parent].children.push(child);
        }

        let names: Vec<String> = hierarchy.nodes.iter().map(|n| n.tag.name.clone()).collect();
        for node in &mut hierarchy.nodes {
            node.children.sort_by(|a, b| names[*a].cmp(&names[*b]));
        }
        hierarchy
    }

    /// Loads the current tags and edges from a backend.
    pub fn load(backend: &dyn Backend) -> Result<Self> {
        Ok(Self::from_parts(backend.all_tags()?, backend.all_edges()?))
    }

    /// Only called while building, when the parent links are still acyclic.
    fn is_ancestor_or_self(&self, ancestor: usize, idx: usize) -> bool {
        let mut current = Some(idx);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.nodes[i].parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.by_id.get(&id).map(|&idx| &self.nodes[idx].tag)
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.by_name.get(name).map(|&idx| &self.nodes[idx].tag)
    }

    /// All tags ordered by name.
    pub fn tags(&self) -> Vec<&Tag> {
        let mut tags: Vec<&Tag> = self.nodes.iter().map(|n| &n.tag).collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    pub fn parent(&self, id: TagId) -> Option<TagId> {
        let idx = *self.by_id.get(&id)?;
        self.nodes[idx].parent.map(|p| self.nodes[p].tag.id)
    }

    /// Direct children ordered by name.
    pub fn children(&self, id: TagId) -> Vec<TagId> {
        self.by_id
            .get(&id)
            .map(|&idx| {
                self.nodes[idx]
                    .children
                    .iter()
                    .map(|&c| self.nodes[c].tag.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn root_indices(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent.is_none())
            .collect();
        roots.sort_by(|a, b| self.nodes[*a].tag.name.cmp(&self.nodes[*b].tag.name));
        roots
    }

    /// Tags without a parent, ordered by name.
    pub fn roots(&self) -> Vec<TagId> {
        self.root_indices()
            .into_iter()
            .map(|i| self.nodes[i].tag.id)
            .collect()
    }

    /// Ids from the root down to `id`, inclusive. Empty for an unknown id.
    pub fn path_of(&self, id: TagId) -> Vec<TagId> {
        let Some(&start) = self.by_id.get(&id) else {
            return Vec::new();
        };
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(idx) = current {
            if !seen.insert(idx) {
                break;
            }
            path.push(self.nodes[idx].tag.id);
            current = self.nodes[idx].parent;
        }
        path.reverse();
        path
    }

    /// Names from the root down to `name`, ending with `name` itself.
    ///
    /// # Errors
    /// `Error::TagNotFound` if no tag has that name.
    pub fn ancestor_path(&self, name: &str) -> Result<Vec<String>> {
        let tag = self
            .tag_by_name(name)
            .ok_or_else(|| Error::TagNotFound(name.to_string()))?;
        Ok(self
            .path_of(tag.id)
            .into_iter()
            .filter_map(|id| self.tag(id).map(|t| t.name.clone()))
            .collect())
    }

    /// The root-first path joined with the separator, e.g. "Science/Archaeology".
    pub fn path_string(&self, id: TagId) -> Option<String> {
        if !self.contains(id) {
            return None;
        }
        let names: Vec<&str> = self
            .path_of(id)
            .into_iter()
            .filter_map(|id| self.tag(id).map(|t| t.name.as_str()))
            .collect();
        let separator = PATH_SEPARATOR.to_string();
        Some(names.join(separator.as_str()))
    }

    /// Every tag above `id`, excluding `id`.
    pub fn ancestor_closure(&self, id: TagId) -> HashSet<TagId> {
        let mut closure: HashSet<TagId> = self.path_of(id).into_iter().collect();
        closure.remove(&id);
        closure
    }

    /// Every tag below `id`, excluding `id`, by breadth-first traversal.
    pub fn descendant_closure(&self, id: TagId) -> HashSet<TagId> {
        let mut closure = HashSet::new();
        let Some(&start) = self.by_id.get(&id) else {
            return closure;
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            for &child in &self.nodes[idx].children {
                if visited.insert(child) {
                    closure.insert(self.nodes[child].tag.id);
                    queue.push_back(child);
                }
            }
        }
        closure
    }

    /// The given tags together with all their ancestors and descendants.
    ///
    /// Unknown ids are dropped.
    pub fn expand<I>(&self, ids: I) -> HashSet<TagId>
    where
        I: IntoIterator<Item = TagId>,
    {
        let mut expanded = HashSet::new();
        for id in ids {
            if !self.contains(id) {
                continue;
            }
            expanded.insert(id);
            expanded.extend(self.ancestor_closure(id));
            expanded.extend(self.descendant_closure(id));
        }
        expanded
    }

    /// The whole forest as nested `TagNode`s, roots and children ordered by name.
    pub fn forest(&self) -> Vec<TagNode> {
        if self.is_empty() {
            return Vec::new();
        }
        // Breadth-first order puts every parent before its children, so
        // building in reverse always finds the children ready.
        let roots = self.root_indices();
        let mut depth = vec![0usize; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &child in &self.nodes[idx].children {
                depth[child] = depth[idx] + 1;
                queue.push_back(child);
            }
        }

        let mut built: Vec<Option<TagNode>> = vec![None; self.nodes.len()];
        for &idx in order.iter().rev() {
            let node = &self.nodes[idx];
            let children = node
                .children
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            built[idx] = Some(TagNode {
                id: node.tag.id,
                name: node.tag.name.clone(),
                description: node.tag.description.clone(),
                depth: depth[idx],
                children,
            });
        }

        roots.into_iter().filter_map(|r| built[r].take()).collect()
    }
}
