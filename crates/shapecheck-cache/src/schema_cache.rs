//! Global schema cache: generated schemas keyed by stable type id.

use indexmap::IndexMap;
use serde::Serialize;
use shapecheck_ir::{GeneratedSchema, TypeId};

/// Hit/miss counters for a [`SchemaCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    /// Entries dropped because their fingerprint was out of date.
    pub invalidations: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Bounded LRU map from [`TypeId`] to [`GeneratedSchema`].
///
/// Entries are kept in recency order, least recently used first. A hit
/// moves the entry to the back; inserting past `max_size` evicts from
/// the front. A `max_size` of zero retains nothing.
#[derive(Debug, Clone)]
pub struct SchemaCache {
    entries: IndexMap<TypeId, GeneratedSchema>,
    max_size: usize,
    stats: CacheStats,
}

impl SchemaCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            max_size,
            stats: CacheStats::default(),
        }
    }

    /// Look up an entry, counting the hit or miss and refreshing recency.
    pub fn get(&mut self, id: TypeId) -> Option<&GeneratedSchema> {
        match self.entries.get_index_of(&id) {
            Some(index) => {
                self.stats.hits += 1;
                let last = self.entries.len() - 1;
                self.entries.move_index(index, last);
                tracing::debug!(%id, "schema cache hit");
                self.entries.get_index(last).map(|(_, schema)| schema)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// [`get`](Self::get), treating an entry generated from a different
    /// fingerprint as a miss and dropping it.
    pub fn get_current(&mut self, id: TypeId, fingerprint: u64) -> Option<&GeneratedSchema> {
        if self
            .entries
            .get(&id)
            .is_some_and(|schema| schema.fingerprint != fingerprint)
        {
            self.entries.shift_remove(&id);
            self.stats.invalidations += 1;
            tracing::debug!(%id, "stale schema dropped from cache");
        }
        self.get(id)
    }

    /// Whether [`get_current`](Self::get_current) would hit, without
    /// touching stats or recency.
    pub fn is_current(&self, id: TypeId, fingerprint: u64) -> bool {
        self.peek(id)
            .is_some_and(|schema| schema.fingerprint == fingerprint)
    }

    /// Look up without touching stats or recency.
    pub fn peek(&self, id: TypeId) -> Option<&GeneratedSchema> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Insert or replace an entry, evicting the least recently used
    /// entries beyond the bound.
    pub fn insert(&mut self, schema: GeneratedSchema) {
        if self.max_size == 0 {
            return;
        }
        let id = schema.id;
        let (index, _) = self.entries.insert_full(id, schema);
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.stats.inserts += 1;

        while self.entries.len() > self.max_size {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                self.stats.evictions += 1;
                tracing::debug!(id = %evicted, "evicted from schema cache");
            }
        }
    }

    pub fn remove(&mut self, id: TypeId) -> Option<GeneratedSchema> {
        self.entries.shift_remove(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Cached ids, least recently used first.
    pub fn ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.entries.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapecheck_ir::{DeclKind, Validator};

    fn schema(name: &str) -> GeneratedSchema {
        GeneratedSchema {
            id: TypeId::declaration("a.ts", name),
            name: name.to_string(),
            file: "a.ts".to_string(),
            kind: DeclKind::Interface,
            exported: true,
            validator: Validator::string(),
            members: Vec::new(),
            dependencies: Vec::new(),
            field_sources: Vec::new(),
            diagnostics: Vec::new(),
            fingerprint: 1,
        }
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let mut cache = SchemaCache::new(10);
        let a = schema("A");
        let id = a.id;
        assert!(cache.get(id).is_none());
        cache.insert(a.clone());
        assert_eq!(cache.get(id), Some(&a));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.inserts), (1, 1, 1));
        assert_eq!(stats.lookups(), 2);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = SchemaCache::new(2);
        let (a, b, c) = (schema("A"), schema("B"), schema("C"));
        cache.insert(a.clone());
        cache.insert(b.clone());
        // touch A so B becomes the eviction candidate
        assert!(cache.get(a.id).is_some());
        cache.insert(c.clone());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(a.id));
        assert!(!cache.contains(b.id));
        assert!(cache.contains(c.id));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.ids().collect::<Vec<_>>(), vec![a.id, c.id]);
    }

    #[test]
    fn test_replace_refreshes_recency() {
        let mut cache = SchemaCache::new(2);
        let (a, b, c) = (schema("A"), schema("B"), schema("C"));
        cache.insert(a.clone());
        cache.insert(b.clone());
        cache.insert(a.clone());
        cache.insert(c);
        assert!(cache.contains(a.id));
        assert!(!cache.contains(b.id));
    }

    #[test]
    fn test_zero_size_retains_nothing() {
        let mut cache = SchemaCache::new(0);
        let a = schema("A");
        cache.insert(a.clone());
        assert!(cache.is_empty());
        assert!(cache.get(a.id).is_none());
        assert_eq!(cache.stats().inserts, 0);
    }

    #[test]
    fn test_stale_fingerprint_is_a_miss() {
        let mut cache = SchemaCache::new(4);
        let a = schema("A");
        cache.insert(a.clone());
        assert!(cache.is_current(a.id, 1));
        assert!(!cache.is_current(a.id, 2));

        assert!(cache.get_current(a.id, 2).is_none());
        assert!(!cache.contains(a.id));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.invalidations), (0, 1, 1));

        cache.insert(a.clone());
        assert_eq!(cache.get_current(a.id, 1), Some(&a));
    }

    #[test]
    fn test_peek_does_not_count() {
        let mut cache = SchemaCache::new(4);
        let a = schema("A");
        cache.insert(a.clone());
        assert!(cache.peek(a.id).is_some());
        assert_eq!(cache.stats().lookups(), 0);
    }
}
