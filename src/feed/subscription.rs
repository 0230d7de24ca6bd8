//! Subscription tracker
//!
//! Tracks actively subscribed symbols: a set for dedup plus a parallel ordered
//! list for display and persistence. Both always hold the same elements.
//! Notifying the upstream feed and persisting the list are left to the caller.

use std::collections::HashSet;

/// Ordered, deduplicated set of subscribed symbols
#[derive(Debug, Clone, Default)]
pub struct SubscriptionTracker {
    /// Membership (dedup)
    active: HashSet<String>,
    /// Insertion order
    order: Vec<String>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols `add` would track, without tracking them
    ///
    /// Trimmed, blanks dropped, deduplicated within the batch and against
    /// what is already tracked, in first-seen order.
    pub fn pending<S: AsRef<str>>(&self, symbols: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        symbols
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty() && !self.active.contains(*s) && seen.insert(*s))
            .map(str::to_string)
            .collect()
    }

    /// Track symbols not already tracked, preserving first-seen order
    ///
    /// Returns the symbols actually added, in order (see [`Self::pending`]).
    /// An empty result means nothing needs to be sent upstream or persisted.
    pub fn add<S: AsRef<str>>(&mut self, symbols: &[S]) -> Vec<String> {
        let added = self.pending(symbols);
        for symbol in &added {
            self.active.insert(symbol.clone());
            self.order.push(symbol.clone());
        }
        added
    }

    /// Clear everything, returning the previously tracked symbols in order
    pub fn remove_all(&mut self) -> Vec<String> {
        self.active.clear();
        std::mem::take(&mut self.order)
    }

    #[inline]
    pub fn contains(&self, symbol: &str) -> bool {
        self.active.contains(symbol)
    }

    /// Tracked symbols in insertion order
    #[inline]
    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
