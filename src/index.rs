//! 3D R-tree over bounding volumes.
//!
//! This module wraps an `rstar` R-tree so that the collection engine can ask
//! "which actors overlap this target box" without scanning every actor.
//!
//! The index provides:
//! - Bulk loading of a whole actor set (balanced tree, packed once)
//! - Single insertion for callers that build incrementally
//! - Inclusive AABB range queries returning `(payload, volume)` pairs
//! - Acceptance of duplicate, overlapping and zero-extent volumes
//!
//! The index is build-once, query-many: nothing is removed or mutated once a
//! run starts, so a built index can be shared across rayon workers by
//! reference.

use rstar::{RTree, RTreeObject, AABB};

use crate::volume::BoundingVolume;


/// One stored volume together with its opaque payload.
#[derive(Debug, Clone)]
pub struct IndexEntry<T> {
    pub volume: BoundingVolume,
    pub payload: T,
}

impl<T> RTreeObject for IndexEntry<T> {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        envelope_of(&self.volume)
    }
}

fn envelope_of(volume: &BoundingVolume) -> AABB<[f64; 3]> {
    let (min, max) = (volume.min(), volume.max());
    AABB::from_corners([min.x, min.y, min.z], [max.x, max.y, max.z])
}

/// Balanced hierarchical index over bounding volumes.
///
/// **Context**: A run holds on the order of 10,000 actors and queries them
/// with hundreds of target boxes. A linear scan per target would make the
/// query phase quadratic.
///
/// **How it Works**: Stores each volume in an `rstar` R-tree keyed by its
/// 3D envelope. Queries walk only the subtrees whose envelopes overlap the
/// region and return every stored volume that intersects it (touching
/// counts as intersecting). A [`BoundingVolume`] can only be built with
/// `min <= max` on every axis, so neither stored volumes nor query regions
/// need checking here.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T = String> {
    tree: RTree<IndexEntry<T>>,
}

impl<T> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self { tree: RTree::new() }
    }
}

impl<T> SpatialIndex<T> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs a whole batch of volumes into a balanced tree.
    pub fn bulk_load(entries: Vec<(BoundingVolume, T)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(volume, payload)| IndexEntry { volume, payload })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Adds one volume with its payload.
    pub fn insert(&mut self, volume: BoundingVolume, payload: T) {
        self.tree.insert(IndexEntry { volume, payload });
    }

    /// Returns every stored `(payload, volume)` whose volume intersects `region`.
    /// Order is unspecified.
    pub fn query(&self, region: &BoundingVolume) -> Vec<(&T, &BoundingVolume)> {
        let envelope = envelope_of(region);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| (&entry.payload, &entry.volume))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
