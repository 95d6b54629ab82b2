/// Old generation of the heap.
///
/// Holds objects promoted out of the young generation. It has no capacity
/// limit, it is only reclaimed by major collections.
#[derive(Debug, Default, Clone)]
pub struct OldSpace {
    allocated_bytes: usize,
    objects: usize,
}

impl OldSpace {
    pub fn new() -> Self {
        Self {
            allocated_bytes: 0,
            objects: 0,
        }
    }

    pub fn promote(&mut self, size: usize) {
        self.allocated_bytes += size;
        self.objects += 1;
    }

    pub fn reclaim(&mut self, size: usize) {
        debug_assert!(self.objects > 0, "reclaiming from an empty old space");
        self.allocated_bytes = self.allocated_bytes.saturating_sub(size);
        self.objects = self.objects.saturating_sub(1);
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub fn objects(&self) -> usize {
        self.objects
    }

    pub fn free_allocated(&mut self) {
        self.allocated_bytes = 0;
        self.objects = 0;
    }
}
