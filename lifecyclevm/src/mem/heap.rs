use bitvec::vec::BitVec;
use tracing::{debug, info, warn};

use crate::mem::{
    allocator::Allocator,
    handle::ObjectHandle,
    old_space::OldSpace,
    stats::{CollectionResult, CollectionStats},
    Generation, HeapError, ObjectAllocator, Options,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapObject {
    pub size_bytes: usize,
    pub generation: Generation,
    /// Number of minor collections the object has survived.
    pub age: u32,
}

struct Slot {
    epoch: u32,
    object: Option<HeapObject>,
}

/// Simulated generational heap.
///
/// Objects are allocated into a bounded young generation. When an
/// allocation would not fit, a minor collection runs first: unreachable
/// young objects are reclaimed and survivors age, old enough survivors are
/// promoted to the unbounded old generation.
///
/// Every allocated object counts as rooted until it is `release`d.
pub struct GenerationalHeap {
    options: Options,
    young: Allocator,
    old: OldSpace,
    slots: Vec<Slot>,
    free_slots: Vec<usize>,
    /// Reachability mark of each slot, cleared by `release`.
    reachable: BitVec,
    stats: CollectionStats,
}

impl GenerationalHeap {
    pub fn new(options: Options) -> Self {
        Self {
            young: Allocator::new(options.young_capacity),
            old: OldSpace::new(),
            options,
            slots: Vec::new(),
            free_slots: Vec::new(),
            reachable: BitVec::new(),
            stats: CollectionStats::default(),
        }
    }

    pub fn with_young_capacity(young_capacity: usize) -> Self {
        Self::new(Options::with_young_capacity(young_capacity))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Bytes currently held by the young generation.
    pub fn resident_bytes(&self) -> usize {
        self.young.bytes_allocated
    }

    pub fn old_bytes(&self) -> usize {
        self.old.allocated_bytes()
    }

    pub fn stats(&self) -> CollectionStats {
        self.stats
    }

    /// Number of objects that have not been reclaimed yet, in both
    /// generations.
    pub fn live_objects(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&HeapObject> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.epoch == handle.epoch())
            .and_then(|slot| slot.object.as_ref())
    }

    /// `None` if the handle's object has already been reclaimed.
    pub fn is_reachable(&self, handle: ObjectHandle) -> Option<bool> {
        self.object(handle)
            .map(|_| self.reachable[handle.index()])
    }

    pub fn allocate(&mut self, size_bytes: usize) -> Result<ObjectHandle, HeapError> {
        if size_bytes == 0 {
            return Err(HeapError::InvalidSize);
        }
        if !self.young.fits(size_bytes) {
            debug!(
                "Young generation cannot fit {size_bytes} bytes ({} of {} used), collecting",
                self.young.bytes_allocated, self.young.allocated_limit
            );
            self.minor_collection();
        }
        if !self.young.try_reserve(size_bytes) {
            self.stats.record_failed_allocation();
            warn!("Out of memory allocating {size_bytes} bytes");
            return Err(HeapError::OutOfMemory {
                requested: size_bytes,
                available: self.young.available(),
            });
        }
        self.stats.record_allocation(size_bytes);
        Ok(self.insert(HeapObject {
            size_bytes,
            generation: Generation::Young,
            age: 0,
        }))
    }

    /// Drops the root of the object. A young object is reclaimed by the next
    /// collection, an old one by the next explicit `collect`. Releasing an
    /// object twice is a no-op.
    pub fn release(&mut self, handle: ObjectHandle) -> Result<(), HeapError> {
        if self.object(handle).is_none() {
            return Err(HeapError::InvalidHandle(handle));
        }
        self.reachable.set(handle.index(), false);
        Ok(())
    }

    /// Full collection: a minor collection followed by a sweep of the old
    /// generation, so every released object is reclaimed whatever its
    /// generation. Collections triggered by `allocate` stay young only.
    pub fn collect(&mut self) -> CollectionStats {
        self.minor_collection();
        self.sweep_old_generation();
        self.stats
    }

    fn insert(&mut self, object: HeapObject) -> ObjectHandle {
        match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.object = Some(object);
                self.reachable.set(index, true);
                ObjectHandle::new(index, slot.epoch)
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    epoch: 0,
                    object: Some(object),
                });
                self.reachable.push(true);
                ObjectHandle::new(index, 0)
            }
        }
    }

    fn free_slot(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.object = None;
        slot.epoch = slot.epoch.wrapping_add(1);
        self.reachable.set(index, false);
        self.free_slots.push(index);
    }

    #[tracing::instrument(skip(self), fields(resident = self.young.bytes_allocated))]
    fn minor_collection(&mut self) -> CollectionResult {
        let mut result = CollectionResult::default();
        let mut dead = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(object) = slot.object.as_mut() else {
                continue;
            };
            if object.generation != Generation::Young {
                continue;
            }
            if !self.reachable[index] {
                self.young.release(object.size_bytes);
                result.freed(object.size_bytes);
                dead.push(index);
                continue;
            }
            object.age += 1;
            if self.options.promotes(object.age) {
                object.generation = Generation::Old;
                self.young.release(object.size_bytes);
                self.old.promote(object.size_bytes);
                result.promoted(object.size_bytes);
            }
        }
        for index in dead {
            self.free_slot(index);
        }
        result.live_bytes = self.young.bytes_allocated;
        self.stats.record_minor(&result);
        info!(
            freed = result.bytes_freed,
            promoted = result.bytes_promoted,
            live = result.live_bytes,
            "Minor collection finished"
        );
        result
    }

    #[tracing::instrument(skip(self), fields(old = self.old.allocated_bytes()))]
    fn sweep_old_generation(&mut self) -> CollectionResult {
        let mut result = CollectionResult::default();
        let mut dead = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(object) = slot.object.as_ref() else {
                continue;
            };
            if object.generation == Generation::Old && !self.reachable[index] {
                self.old.reclaim(object.size_bytes);
                result.freed(object.size_bytes);
                dead.push(index);
            }
        }
        for index in dead {
            self.free_slot(index);
        }
        result.live_bytes = self.old.allocated_bytes();
        self.stats.record_major(&result);
        info!(
            freed = result.bytes_freed,
            live = result.live_bytes,
            "Major collection finished"
        );
        result
    }
}

impl ObjectAllocator for GenerationalHeap {
    fn allocate(&mut self, size_bytes: usize) -> Result<ObjectHandle, HeapError> {
        GenerationalHeap::allocate(self, size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::class::ClassLayout;

    use super::*;

    const CAPACITY: usize = 4096;
    const OBJECT: usize = 1024;

    fn heap() -> GenerationalHeap {
        GenerationalHeap::with_young_capacity(CAPACITY)
    }

    #[test]
    fn zero_sized_allocation_is_rejected() {
        let mut heap = heap();
        assert_eq!(heap.allocate(0), Err(HeapError::InvalidSize));
        assert_eq!(heap.stats(), CollectionStats::default());
    }

    #[test]
    fn allocations_that_fit_never_collect() {
        let mut heap = heap();
        for size in [512, 1024, 256, 2048, 256] {
            heap.allocate(size).unwrap();
        }
        assert_eq!(heap.resident_bytes(), CAPACITY);
        assert_eq!(heap.stats().collections, 0);
        assert_eq!(heap.stats().allocated_objects, 5);
    }

    #[test]
    fn overflowing_allocation_collects_once_then_fails_when_everything_is_live() {
        let mut heap = heap();
        for _ in 0..4 {
            heap.allocate(OBJECT).unwrap();
        }
        assert_eq!(
            heap.allocate(OBJECT),
            Err(HeapError::OutOfMemory {
                requested: OBJECT,
                available: 0,
            })
        );
        let stats = heap.stats();
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.reclaimed_bytes, 0);
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(heap.resident_bytes(), CAPACITY);
    }

    #[test]
    fn releasing_objects_makes_room_for_the_next_allocation() {
        let mut heap = heap();
        let handles: Vec<_> = (0..4).map(|_| heap.allocate(OBJECT).unwrap()).collect();
        heap.release(handles[0]).unwrap();
        heap.release(handles[1]).unwrap();
        // nothing is reclaimed until a collection runs
        assert_eq!(heap.resident_bytes(), CAPACITY);

        heap.allocate(OBJECT).unwrap();
        let stats = heap.stats();
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.reclaimed_bytes, 2048);
        assert_eq!(stats.reclaimed_objects, 2);
        assert_eq!(heap.resident_bytes(), 3 * OBJECT);
        assert!(heap.object(handles[0]).is_none());
        assert!(heap.object(handles[2]).is_some());
    }

    #[test]
    fn releasing_everything_empties_the_young_generation() {
        let mut heap = heap();
        let handles: Vec<_> = [100, 200, 300].iter().map(|s| heap.allocate(*s).unwrap()).collect();
        for handle in &handles {
            heap.release(*handle).unwrap();
        }
        let stats = heap.collect();
        assert_eq!(heap.resident_bytes(), 0);
        assert_eq!(stats.reclaimed_bytes, 600);
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn collecting_without_garbage_reclaims_nothing() {
        let mut heap = heap();
        heap.allocate(OBJECT).unwrap();
        let first = heap.collect();
        let second = heap.collect();
        assert_eq!(first.reclaimed_bytes, 0);
        assert_eq!(second.reclaimed_bytes, 0);
        assert_eq!(second.collections, 2);
        assert_eq!(heap.resident_bytes() + heap.old_bytes(), OBJECT);
        assert_eq!(heap.live_objects(), 1);
    }

    #[test]
    fn survivors_are_promoted_after_reaching_the_threshold() {
        let mut heap = GenerationalHeap::new(Options {
            young_capacity: CAPACITY,
            promotion_threshold: 2,
        });
        let handle = heap.allocate(OBJECT).unwrap();
        heap.collect();
        assert_eq!(heap.object(handle).unwrap().generation, Generation::Young);
        assert_eq!(heap.object(handle).unwrap().age, 1);

        let stats = heap.collect();
        let object = heap.object(handle).unwrap();
        assert_eq!(object.generation, Generation::Old);
        assert_eq!(stats.promoted_objects, 1);
        assert_eq!(stats.promoted_bytes, OBJECT as u64);
        assert_eq!(heap.resident_bytes(), 0);
        assert_eq!(heap.old_bytes(), OBJECT);
    }

    #[test]
    fn promotion_frees_young_space_for_later_allocations() {
        let mut heap = heap();
        for _ in 0..4 {
            heap.allocate(OBJECT).unwrap();
        }
        // first collection only ages the survivors
        assert!(heap.allocate(OBJECT).is_err());
        // second one promotes them
        heap.allocate(OBJECT).unwrap();
        let stats = heap.stats();
        assert_eq!(stats.collections, 2);
        assert_eq!(stats.promoted_objects, 4);
        assert_eq!(heap.resident_bytes(), OBJECT);
        assert_eq!(heap.old_bytes(), CAPACITY);
    }

    #[test]
    fn zero_threshold_disables_promotion() {
        let mut heap = GenerationalHeap::new(Options {
            young_capacity: CAPACITY,
            promotion_threshold: 0,
        });
        let handle = heap.allocate(OBJECT).unwrap();
        for _ in 0..10 {
            heap.collect();
        }
        assert_eq!(heap.object(handle).unwrap().generation, Generation::Young);
        assert_eq!(heap.stats().promoted_objects, 0);
    }

    #[test]
    fn allocation_triggered_collection_keeps_released_old_objects() {
        let mut heap = GenerationalHeap::new(Options {
            young_capacity: CAPACITY,
            promotion_threshold: 1,
        });
        let promoted = heap.allocate(OBJECT).unwrap();
        heap.collect();
        assert_eq!(heap.object(promoted).unwrap().generation, Generation::Old);
        heap.release(promoted).unwrap();

        for _ in 0..4 {
            heap.allocate(OBJECT).unwrap();
        }
        // overflow runs a young only collection, promoting the four survivors
        heap.allocate(OBJECT).unwrap();
        assert_eq!(heap.is_reachable(promoted), Some(false));
        assert_eq!(heap.old_bytes(), 5 * OBJECT);
        assert_eq!(heap.stats().major_collections, 1);
        assert_eq!(heap.stats().reclaimed_bytes, 0);
    }

    #[test]
    fn explicit_collection_reclaims_released_old_objects() {
        let mut heap = GenerationalHeap::new(Options {
            young_capacity: CAPACITY,
            promotion_threshold: 1,
        });
        let handle = heap.allocate(OBJECT).unwrap();
        heap.collect();
        assert_eq!(heap.old_bytes(), OBJECT);
        heap.release(handle).unwrap();

        let stats = heap.collect();
        assert_eq!(heap.old_bytes(), 0);
        assert_eq!(stats.major_collections, 2);
        assert_eq!(stats.reclaimed_bytes, OBJECT as u64);
        assert_eq!(stats.reclaimed_objects, 1);
        assert!(heap.object(handle).is_none());
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn stale_handles_are_rejected_after_slot_reuse() {
        let mut heap = heap();
        let stale = heap.allocate(OBJECT).unwrap();
        heap.release(stale).unwrap();
        heap.collect();
        let fresh = heap.allocate(OBJECT).unwrap();
        assert_eq!(fresh.index(), stale.index());
        assert_ne!(fresh, stale);
        assert_eq!(heap.release(stale), Err(HeapError::InvalidHandle(stale)));
        assert_eq!(heap.is_reachable(fresh), Some(true));
    }

    #[test]
    fn releasing_twice_is_a_noop() {
        let mut heap = heap();
        let handle = heap.allocate(OBJECT).unwrap();
        heap.release(handle).unwrap();
        heap.release(handle).unwrap();
        assert_eq!(heap.collect().reclaimed_objects, 1);
    }

    #[test]
    fn object_larger_than_the_young_generation_fails() {
        let mut heap = heap();
        assert!(matches!(
            heap.allocate(CAPACITY + 1),
            Err(HeapError::OutOfMemory { .. })
        ));
        // the heap stays usable
        heap.allocate(CAPACITY).unwrap();
    }

    #[test]
    fn instances_are_allocated_with_their_class_layout() {
        let mut heap = heap();
        let handle = heap
            .allocate_instance(ClassLayout { instance_size: 48 })
            .unwrap();
        assert_eq!(heap.object(handle).unwrap().size_bytes, 48);
        assert_eq!(heap.resident_bytes(), 48);
    }
}
