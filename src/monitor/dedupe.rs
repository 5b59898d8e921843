//! Delivered-event ledger for a single subscription.
//!
//! The ledger only grows: ids are never pruned, so an event id that was
//! delivered once is never delivered to the same subscription again.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeRecord {
    delivered: HashSet<String>,
}

impl DedupeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.delivered.contains(event_id)
    }

    /// Returns `true` if the id was not already present.
    pub fn insert(&mut self, event_id: impl Into<String>) -> bool {
        self.delivered.insert(event_id.into())
    }

    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }

    /// Events whose id has not been delivered yet, in input order. Repeats of
    /// the same id within `events` are collapsed to the first occurrence.
    pub fn fresh<'a, E, F>(&self, events: &'a [E], id_of: F) -> Vec<&'a E>
    where
        F: Fn(&E) -> &str,
    {
        let mut seen = HashSet::new();
        events
            .iter()
            .filter(|event| {
                let id = id_of(*event);
                !self.contains(id) && seen.insert(id.to_string())
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for DedupeRecord {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            delivered: iter.into_iter().map(Into::into).collect(),
        }
    }
}
