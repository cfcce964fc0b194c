//! Icon cache scoped to the displayed category.
//!
//! Values are either a rendered bitmap or a negative entry recording that
//! extraction already failed for the key. The owner clears the cache on every
//! category switch, which bounds memory to one category's worth of icons.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::icons::{Bitmap, IconKey};

/// A cached lookup result; `None` is a negative entry.
pub type CachedIcon = Option<Arc<Bitmap>>;

#[derive(Default)]
pub struct IconCache {
    entries: HashMap<IconKey, CacheEntry>,
    stats: CacheStats,
}

struct CacheEntry {
    value: CachedIcon,
    access_count: u64,
}

#[allow(dead_code)]
impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`. The outer `Option` is hit/miss, the inner one is the
    /// cached result.
    pub fn get(&mut self, key: &IconKey) -> Option<CachedIcon> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.access_count += 1;
                self.stats.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: IconKey, value: CachedIcon) {
        let kind = if value.is_some() { "resolved" } else { "negative" };
        tracing::trace!("Caching {} icon for {}", kind, key);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                access_count: 0,
            },
        );
    }

    pub fn contains(&self, key: &IconKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.clears += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.entries = self.entries.len();
        stats.negative_entries = self.entries.values().filter(|e| e.value.is_none()).count();
        stats.reused_entries = self.entries.values().filter(|e| e.access_count > 0).count();
        stats.hit_rate = CacheStats::calc_rate(stats.hits, stats.misses);
        stats
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub negative_entries: usize,
    /// Entries served at least once after insertion
    pub reused_entries: usize,

    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f32,

    /// Number of full invalidations (category switches)
    pub clears: u64,
}

impl CacheStats {
    fn calc_rate(hits: u64, misses: u64) -> f32 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        }
    }
}
