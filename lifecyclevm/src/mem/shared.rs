use crate::{
    mem::{
        handle::ObjectHandle, heap::GenerationalHeap, stats::CollectionStats, HeapError,
        ObjectAllocator, Options,
    },
    sync::{self, Arc, Mutex, MutexGuard},
};

/// Heap shared between threads.
///
/// Every operation runs under a single lock, a collection always sees a
/// consistent snapshot of liveness and no allocation can interleave with it.
#[derive(Clone)]
pub struct SharedHeap {
    heap: Arc<Mutex<GenerationalHeap>>,
}

impl SharedHeap {
    pub fn new(options: Options) -> Self {
        Self {
            heap: Arc::new(Mutex::new(GenerationalHeap::new(options))),
        }
    }

    pub fn allocate(&self, size_bytes: usize) -> Result<ObjectHandle, HeapError> {
        self.lock().allocate(size_bytes)
    }

    pub fn release(&self, handle: ObjectHandle) -> Result<(), HeapError> {
        self.lock().release(handle)
    }

    /// Full collection of both generations under the heap lock.
    pub fn collect(&self) -> CollectionStats {
        self.lock().collect()
    }

    pub fn stats(&self) -> CollectionStats {
        self.lock().stats()
    }

    pub fn resident_bytes(&self) -> usize {
        self.lock().resident_bytes()
    }

    /// Locks the heap for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, GenerationalHeap> {
        sync::lock(&self.heap)
    }
}

impl ObjectAllocator for SharedHeap {
    fn allocate(&mut self, size_bytes: usize) -> Result<ObjectHandle, HeapError> {
        SharedHeap::allocate(self, size_bytes)
    }
}
