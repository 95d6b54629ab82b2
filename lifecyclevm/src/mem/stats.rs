//! Collection statistics.
//!
//! Running counters describing allocation pressure and collection activity
//! of a `GenerationalHeap`.

use serde::Serialize;

/// Cumulative statistics of a heap. Callers only ever get copies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Number of minor collections, including the ones run as part of a
    /// major collection.
    pub collections: u64,
    /// Number of full collections, which sweep both generations.
    pub major_collections: u64,
    /// Total bytes reclaimed from unreachable objects.
    pub reclaimed_bytes: u64,
    pub reclaimed_objects: u64,
    /// Total objects promoted from the young to the old generation.
    pub promoted_objects: u64,
    pub promoted_bytes: u64,
    /// Successful allocations since the heap was created.
    pub allocated_bytes: u64,
    pub allocated_objects: u64,
    /// Allocations that failed with an out of memory error.
    pub failed_allocations: u64,
}

impl CollectionStats {
    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.allocated_bytes += size as u64;
        self.allocated_objects += 1;
    }

    pub(crate) fn record_failed_allocation(&mut self) {
        self.failed_allocations += 1;
    }

    pub(crate) fn record_minor(&mut self, result: &CollectionResult) {
        self.collections += 1;
        self.record_reclaimed(result);
        self.promoted_bytes += result.bytes_promoted as u64;
        self.promoted_objects += result.objects_promoted as u64;
    }

    pub(crate) fn record_major(&mut self, result: &CollectionResult) {
        self.major_collections += 1;
        self.record_reclaimed(result);
    }

    fn record_reclaimed(&mut self, result: &CollectionResult) {
        self.reclaimed_bytes += result.bytes_freed as u64;
        self.reclaimed_objects += result.objects_freed as u64;
    }
}

/// Outcome of a single collection pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectionResult {
    pub bytes_freed: usize,
    pub objects_freed: usize,
    pub bytes_promoted: usize,
    pub objects_promoted: usize,
    /// Bytes left in the collected generation after the pass.
    pub live_bytes: usize,
}

impl CollectionResult {
    pub(crate) fn freed(&mut self, size: usize) {
        self.bytes_freed += size;
        self.objects_freed += 1;
    }

    pub(crate) fn promoted(&mut self, size: usize) {
        self.bytes_promoted += size;
        self.objects_promoted += 1;
    }
}
