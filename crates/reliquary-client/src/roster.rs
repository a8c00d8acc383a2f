//! In-memory gift/item roster of one character.
//!
//! Two sources feed it: the baseline fetch and gateway push events. They
//! may arrive in any order and events may be delivered more than once, so
//! entries are keyed by join-record id and the last write for an id wins.
//! Storage order is insertion order; display order is computed on every
//! read by a stable, case-insensitive sort on the detail name.

use std::cmp::Ordering;
use std::collections::HashSet;

use uuid::Uuid;

use reliquary_types::models::{Gift, GiftEntry, Item, ItemEntry};

/// A join record carrying a named detail.
pub trait RosterEntry: Clone {
    type Detail: Clone;

    /// Join-record id.
    fn link_id(&self) -> Uuid;
    fn name(&self) -> &str;
    fn detail(&self) -> &Self::Detail;
}

impl RosterEntry for GiftEntry {
    type Detail = Gift;

    fn link_id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.gift.name
    }

    fn detail(&self) -> &Gift {
        &self.gift
    }
}

impl RosterEntry for ItemEntry {
    type Detail = Item;

    fn link_id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.item.name
    }

    fn detail(&self) -> &Item {
        &self.item
    }
}

/// One line of a rendered roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listed<T> {
    pub link_id: Uuid,
    pub detail: T,
    /// Arrived through a push event while the view was open.
    pub fresh: bool,
}

#[derive(Debug, Clone)]
pub struct RosterList<E> {
    entries: Vec<E>,
    fresh: HashSet<Uuid>,
}

impl<E> Default for RosterList<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            fresh: HashSet::new(),
        }
    }
}

impl<E: RosterEntry> RosterList<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, link_id: Uuid) -> bool {
        self.position(link_id).is_some()
    }

    pub fn is_fresh(&self, link_id: Uuid) -> bool {
        self.fresh.contains(&link_id)
    }

    /// Merge a bulk fetch. Entries already present (from events that beat
    /// the fetch) are overwritten in place; entries only known from events
    /// are kept.
    pub fn merge_baseline(&mut self, baseline: Vec<E>) {
        for entry in baseline {
            self.upsert(entry);
        }
    }

    /// Apply a pushed join record. Returns false if the join id was
    /// already known, in which case the entry is refreshed but not duplicated.
    pub fn push(&mut self, entry: E) -> bool {
        let link_id = entry.link_id();
        if self.upsert(entry) {
            self.fresh.insert(link_id);
            true
        } else {
            false
        }
    }

    /// Entries in display order.
    pub fn sorted(&self) -> Vec<&E> {
        let mut sorted: Vec<&E> = self.entries.iter().collect();
        sorted.sort_by(|a, b| compare_names(a.name(), b.name()));
        sorted
    }

    pub fn listed(&self) -> Vec<Listed<E::Detail>> {
        self.sorted()
            .into_iter()
            .map(|entry| Listed {
                link_id: entry.link_id(),
                detail: entry.detail().clone(),
                fresh: self.is_fresh(entry.link_id()),
            })
            .collect()
    }

    /// Returns true if the entry was new.
    fn upsert(&mut self, entry: E) -> bool {
        match self.position(entry.link_id()) {
            Some(i) => {
                self.entries[i] = entry;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    fn position(&self, link_id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.link_id() == link_id)
    }
}

/// Everything shown on a character sheet.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub gifts: RosterList<GiftEntry>,
    pub items: RosterList<ItemEntry>,
}

impl Roster {
    pub fn contains(&self, link_id: Uuid) -> bool {
        self.gifts.contains(link_id) || self.items.contains(link_id)
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
