//! Bounded LRU mesh cache.
//!
//! Caches reconstructed meshes per session revision so preview consumers and
//! late readers do not trigger re-reconstruction. Bounded by both entry count
//! and approximate resident bytes; eviction is strictly least-recently-used,
//! so tests can predict exactly which entries survive.

use std::collections::VecDeque;
use std::mem::size_of;
use std::sync::Arc;

use scan_types::{MeshVertex, ScanMesh};
use tracing::debug;

/// Identifies a cached mesh: one session, one reconstruction revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Acquisition session id.
    pub session: u64,
    /// Reconstruction revision within the session, monotonically increasing.
    pub revision: u64,
}

/// Cache activity counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Entries evicted to stay within the ceilings.
    pub evictions: u64,
    /// Approximate bytes currently resident.
    pub resident_bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hits, {} misses, {} evictions, {} bytes resident",
            self.hits, self.misses, self.evictions, self.resident_bytes
        )
    }
}

/// Approximate heap footprint of a mesh, in bytes.
#[must_use]
pub fn mesh_bytes(mesh: &ScanMesh) -> usize {
    mesh.vertices.len() * size_of::<MeshVertex>() + mesh.faces.len() * size_of::<[u32; 3]>()
}

/// Bounded LRU cache of reconstructed meshes.
///
/// Entries are held behind `Arc` so eviction never invalidates a mesh a
/// caller is still holding.
#[derive(Debug)]
pub struct MeshCache {
    max_entries: usize,
    max_bytes: usize,
    // Front is least recently used.
    entries: VecDeque<(CacheKey, Arc<ScanMesh>, usize)>,
    stats: CacheStats,
}

impl MeshCache {
    /// Creates a cache with the given ceilings. An entry larger than
    /// `max_bytes` on its own is still admitted; it just evicts everything
    /// else.
    #[must_use]
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            max_bytes,
            entries: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    /// Number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Activity counters.
    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Inserts a mesh, replacing any entry under the same key, then evicts
    /// from the LRU end until both ceilings hold.
    pub fn insert(&mut self, key: CacheKey, mesh: Arc<ScanMesh>) {
        let bytes = mesh_bytes(&mesh);
        if let Some(pos) = self.entries.iter().position(|(k, _, _)| *k == key) {
            if let Some((_, _, old_bytes)) = self.entries.remove(pos) {
                self.stats.resident_bytes -= old_bytes;
            }
        }
        self.entries.push_back((key, mesh, bytes));
        self.stats.resident_bytes += bytes;
        self.evict();
        debug!(
            session = key.session,
            revision = key.revision,
            bytes,
            resident = self.entries.len(),
            "mesh cached"
        );
    }

    /// Looks up a mesh and marks it most recently used.
    pub fn get(&mut self, key: CacheKey) -> Option<Arc<ScanMesh>> {
        let Some(pos) = self.entries.iter().position(|(k, _, _)| *k == key) else {
            self.stats.misses += 1;
            return None;
        };
        self.stats.hits += 1;
        // Option is always Some at a valid position.
        let entry = self.entries.remove(pos)?;
        let mesh = Arc::clone(&entry.1);
        self.entries.push_back(entry);
        Some(mesh)
    }

    /// True if the key is resident, without touching recency.
    #[must_use]
    pub fn contains(&self, key: CacheKey) -> bool {
        self.entries.iter().any(|(k, _, _)| *k == key)
    }

    /// Drops every entry. Counters survive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.resident_bytes = 0;
    }

    fn evict(&mut self) {
        while self.entries.len() > self.max_entries
            || (self.stats.resident_bytes > self.max_bytes && self.entries.len() > 1)
        {
            let Some((key, _, bytes)) = self.entries.pop_front() else {
                break;
            };
            self.stats.resident_bytes -= bytes;
            self.stats.evictions += 1;
            debug!(session = key.session, revision = key.revision, "mesh evicted");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn mesh_with(vertices: usize) -> Arc<ScanMesh> {
        let mut mesh = ScanMesh::new();
        for i in 0..vertices {
            mesh.vertices
                .push(scan_types::MeshVertex::new(Point3::new(i as f64, 0.0, 0.0)));
        }
        Arc::new(mesh)
    }

    const fn key(revision: u64) -> CacheKey {
        CacheKey {
            session: 1,
            revision,
        }
    }

    #[test]
    fn oldest_entry_evicted_first() {
        let mut cache = MeshCache::new(2, usize::MAX);
        cache.insert(key(1), mesh_with(4));
        cache.insert(key(2), mesh_with(4));
        cache.insert(key(3), mesh_with(4));
        assert!(!cache.contains(key(1)));
        assert!(cache.contains(key(2)));
        assert!(cache.contains(key(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn get_refreshes_recency() {
        let mut cache = MeshCache::new(2, usize::MAX);
        cache.insert(key(1), mesh_with(4));
        cache.insert(key(2), mesh_with(4));
        // Touch 1, making 2 the LRU entry.
        assert!(cache.get(key(1)).is_some());
        cache.insert(key(3), mesh_with(4));
        assert!(cache.contains(key(1)));
        assert!(!cache.contains(key(2)));
    }

    #[test]
    fn byte_ceiling_evicts() {
        let per_entry = mesh_bytes(&mesh_with(100));
        let mut cache = MeshCache::new(16, per_entry * 2);
        cache.insert(key(1), mesh_with(100));
        cache.insert(key(2), mesh_with(100));
        cache.insert(key(3), mesh_with(100));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(key(1)));
        assert!(cache.stats().resident_bytes <= per_entry * 2);
    }

    #[test]
    fn oversized_entry_still_admitted() {
        let mut cache = MeshCache::new(4, 1);
        cache.insert(key(1), mesh_with(100));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn replacement_does_not_grow() {
        let mut cache = MeshCache::new(4, usize::MAX);
        cache.insert(key(1), mesh_with(4));
        cache.insert(key(1), mesh_with(8));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().resident_bytes, mesh_bytes(&mesh_with(8)));
    }

    #[test]
    fn miss_counted() {
        let mut cache = MeshCache::new(2, usize::MAX);
        assert!(cache.get(key(9)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }
}
