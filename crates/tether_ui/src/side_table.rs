//! Per-view side tables
//!
//! Data keyed by view tag that lives outside the view tree, such as layout
//! frames. Entries are dropped when their view is removed.

use std::collections::HashMap;

use tether_core::ViewTag;

/// Values of type `T` keyed by view tag
#[derive(Debug, Clone)]
pub struct ViewSideTable<T> {
    entries: HashMap<ViewTag, T>,
}

impl<T> Default for ViewSideTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> ViewSideTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `tag`
    pub fn get(&self, tag: ViewTag) -> Option<&T> {
        self.entries.get(&tag)
    }

    /// Insert or replace the entry for `tag`
    pub fn insert(&mut self, tag: ViewTag, value: T) -> Option<T> {
        self.entries.insert(tag, value)
    }

    /// Remove the entry for `tag`
    pub fn remove(&mut self, tag: ViewTag) -> Option<T> {
        self.entries.remove(&tag)
    }

    /// Check if `tag` has an entry
    pub fn contains(&self, tag: ViewTag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
