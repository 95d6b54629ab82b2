/// Byte accounting for a bounded space.
///
/// Objects of the model do not occupy real memory, the allocator only keeps
/// track of how many bytes have been handed out against the space's limit.
#[derive(Debug, Clone)]
pub struct Allocator {
    pub bytes_allocated: usize,
    pub allocated_limit: usize,
}

impl Allocator {
    pub fn new(allocated_limit: usize) -> Allocator {
        Allocator {
            bytes_allocated: 0,
            allocated_limit,
        }
    }

    /// Returns true if `size` more bytes fit under the limit.
    pub fn fits(&self, size: usize) -> bool {
        match self.bytes_allocated.checked_add(size) {
            Some(total) => total <= self.allocated_limit,
            None => false,
        }
    }

    /// Reserves `size` bytes, returns false without reserving anything if
    /// they do not fit.
    pub fn try_reserve(&mut self, size: usize) -> bool {
        if !self.fits(size) {
            return false;
        }
        self.bytes_allocated += size;
        true
    }

    pub fn release(&mut self, size: usize) {
        debug_assert!(
            size <= self.bytes_allocated,
            "releasing more bytes than have been allocated"
        );
        self.bytes_allocated = self.bytes_allocated.saturating_sub(size);
    }

    pub fn available(&self) -> usize {
        self.allocated_limit.saturating_sub(self.bytes_allocated)
    }

    pub fn reset(&mut self) {
        self.bytes_allocated = 0;
    }
}
