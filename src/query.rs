//! The history query engine.
//!
//! A query is described by `Criteria`, compiled against a `Hierarchy` snapshot
//! into one composed `Predicate`, and evaluated once per entry. Ordering and the
//! limit are applied only after the predicate has narrowed the candidates.

use crate::constants::DEFAULT_LIMIT;
use crate::entry::{Entry, EntryId};
use crate::hierarchy::Hierarchy;
use crate::store::Store;
use crate::tag::TagId;
use crate::text::{contains_folded, fold};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The filters of one history query. Every filter is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// Case- and accent-insensitive substring of the title or the URL.
    pub search: Option<String>,
    /// Matches entries tagged with any of these tags, their ancestors or their descendants.
    pub tags: Vec<String>,
    /// Only entries without any tag.
    pub no_tags: bool,
    /// Case- and accent-insensitive exact platform.
    pub platform: Option<String>,
    /// Exact watch count; 0 selects entries never played.
    pub watch_count: Option<u32>,
    /// Earliest creation date, inclusive from its midnight (UTC).
    pub since: Option<String>,
    pub limit: Option<usize>,
    /// Overrides `limit`.
    pub no_limit: bool,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(name.into());
        self
    }

    pub fn no_tags(mut self) -> Self {
        self.no_tags = true;
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn watch_count(mut self, count: u32) -> Self {
        self.watch_count = Some(count);
        self
    }

    /// `YYYY-MM-DD`, `DD/MM/YYYY` or an RFC 3339 timestamp.
    pub fn since(mut self, date: impl Into<String>) -> Self {
        self.since = Some(date.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn no_limit(mut self) -> Self {
        self.no_limit = true;
        self
    }

    /// The parsed `since` bound, if any.
    ///
    /// # Errors
    /// `Error::InvalidCriteria` if the date is in none of the accepted formats.
    pub fn since_bound(&self) -> Result<Option<DateTime<Utc>>> {
        match non_blank(self.since.as_deref()) {
            Some(raw) => parse_since(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Compiles the criteria into a single predicate over `hierarchy`.
    pub fn predicate(&self, hierarchy: &Hierarchy) -> Result<Predicate> {
        let since = self.since_bound()?;
        Ok(self.build(since, hierarchy))
    }

    fn build(&self, since: Option<DateTime<Utc>>, hierarchy: &Hierarchy) -> Predicate {
        let mut predicate = Predicate::All(Vec::new());
        // Blank searches are dropped, but the needle itself keeps its spaces.
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            predicate = predicate.and(Predicate::Search(fold(search)));
        }
        let names: Vec<&str> = self
            .tags
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if !names.is_empty() {
            let ids = names
                .iter()
                .filter_map(|name| hierarchy.tag_by_name(name))
                .map(|tag| tag.id);
            predicate = predicate.and(Predicate::Tags(hierarchy.expand(ids)));
        }
        if self.no_tags {
            predicate = predicate.and(Predicate::NoTags);
        }
        if let Some(platform) = non_blank(self.platform.as_deref()) {
            predicate = predicate.and(Predicate::Platform(fold(platform)));
        }
        if let Some(count) = self.watch_count {
            predicate = predicate.and(Predicate::WatchCount(count));
        }
        if let Some(since) = since {
            predicate = predicate.and(Predicate::Since(since));
        }
        predicate
    }

    /// The number of results to keep, `None` for all of them.
    pub fn effective_limit(&self, default_limit: usize) -> Option<usize> {
        if self.no_limit {
            None
        } else {
            Some(self.limit.unwrap_or(default_limit))
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).date_naive())
        })
        .ok_or_else(|| Error::InvalidCriteria(format!("unrecognized date '{raw}'")))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidCriteria(format!("no midnight for '{raw}'")))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// A composed filter over an entry and the ids of its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every inner predicate holds. Empty matches everything.
    All(Vec<Predicate>),
    /// Folded needle found in the title or the URL.
    Search(String),
    /// The entry carries at least one of these (already expanded) tags.
    Tags(HashSet<TagId>),
    NoTags,
    /// Folded platform name.
    Platform(String),
    WatchCount(u32),
    Since(DateTime<Utc>),
}

impl Predicate {
    pub fn matches(&self, entry: &Entry, tags: &HashSet<TagId>) -> bool {
        match self {
            Predicate::All(parts) => parts.iter().all(|p| p.matches(entry, tags)),
            Predicate::Search(needle) => {
                contains_folded(&entry.title, needle) || contains_folded(&entry.url, needle)
            }
            Predicate::Tags(wanted) => !wanted.is_disjoint(tags),
            Predicate::NoTags => tags.is_empty(),
            Predicate::Platform(platform) => fold(&entry.platform) == *platform,
            Predicate::WatchCount(count) => entry.watch_count == *count,
            Predicate::Since(since) => entry.created_at >= *since,
        }
    }

    /// Conjunction, flattening nested `All`s.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut parts = match self {
            Predicate::All(parts) => parts,
            single => vec![single],
        };
        match other {
            Predicate::All(more) => parts.extend(more),
            single => parts.push(single),
        }
        Predicate::All(parts)
    }
}

/// A matched entry with the full paths of its tags, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    pub entry: Entry,
    pub tags: Vec<String>,
}

/// Result of a well-formed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Entries(Vec<HistoryItem>),
    /// Nothing matched.
    Empty,
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty)
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn items(&self) -> &[HistoryItem] {
        match self {
            QueryOutcome::Entries(items) => items,
            QueryOutcome::Empty => &[],
        }
    }

    pub fn into_vec(self) -> Vec<HistoryItem> {
        match self {
            QueryOutcome::Entries(items) => items,
            QueryOutcome::Empty => Vec::new(),
        }
    }

    /// Ids of the matched entries, in result order.
    pub fn ids(&self) -> Vec<EntryId> {
        self.items().iter().map(|item| item.entry.id).collect()
    }
}

/// Handle on the history query engine, obtained from `Store::history()`.
#[derive(Clone)]
pub struct History {
    store: Store,
    default_limit: usize,
}

impl History {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Replaces the limit used when the criteria name none.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Runs a query.
    ///
    /// Results are ordered most recent first, ties broken by descending id.
    ///
    /// # Errors
    /// `Error::InvalidCriteria` for malformed criteria, before storage is read.
    pub fn query(&self, criteria: &Criteria) -> Result<QueryOutcome> {
        let since = criteria.since_bound()?;

        let backend = self.store.read_backend()?;
        let hierarchy = Hierarchy::load(&**backend)?;
        let predicate = criteria.build(since, &hierarchy);
        let entries = backend.all_entries()?;
        let mut tags_by_entry: HashMap<EntryId, HashSet<TagId>> = HashMap::new();
        for association in backend.all_associations()? {
            tags_by_entry
                .entry(association.entry)
                .or_default()
                .insert(association.tag);
        }
        drop(backend);

        let candidates = entries.len();
        let untagged = HashSet::new();
        let mut matched: Vec<Entry> = entries
            .into_iter()
            .filter(|entry| {
                let tags = tags_by_entry.get(&entry.id).unwrap_or(&untagged);
                predicate.matches(entry, tags)
            })
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let limit = criteria.effective_limit(self.default_limit);
        debug!(candidates, matched = matched.len(), ?limit, ?predicate, "history query");
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        if matched.is_empty() {
            return Ok(QueryOutcome::Empty);
        }

        let items = matched
            .into_iter()
            .map(|entry| {
                let mut tags: Vec<String> = tags_by_entry
                    .get(&entry.id)
                    .into_iter()
                    .flatten()
                    .filter_map(|&id| hierarchy.path_string(id))
                    .collect();
                tags.sort();
                HistoryItem { entry, tags }
            })
            .collect();
        Ok(QueryOutcome::Entries(items))
    }
}
