pub mod allocator;
pub mod handle;
pub mod heap;
pub mod old_space;
pub mod shared;
pub mod stats;

use serde::Serialize;
use thiserror::Error;

use crate::runtime::class::ClassLayout;

pub use self::{
    handle::ObjectHandle,
    heap::{GenerationalHeap, HeapObject},
    shared::SharedHeap,
    stats::CollectionStats,
};

/// 4 MiB
pub const DEFAULT_YOUNG_CAPACITY: usize = 4 << 20;
pub const DEFAULT_PROMOTION_THRESHOLD: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Capacity of the young generation in bytes.
    pub young_capacity: usize,
    /// Number of minor collections an object has to survive before being
    /// promoted to the old generation. Zero disables promotion.
    pub promotion_threshold: u32,
}

impl Options {
    pub fn with_young_capacity(young_capacity: usize) -> Self {
        Self {
            young_capacity,
            ..Self::default()
        }
    }

    pub fn promotes(&self, age: u32) -> bool {
        self.promotion_threshold != 0 && age >= self.promotion_threshold
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            young_capacity: DEFAULT_YOUNG_CAPACITY,
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Generation {
    Young,
    Old,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error(
        "Out of memory: requested {requested} bytes, {available} bytes available in the young \
         generation after collection"
    )]
    OutOfMemory { requested: usize, available: usize },
    #[error("Object size has to be positive")]
    InvalidSize,
    #[error("Handle {0:?} does not refer to an allocated object")]
    InvalidHandle(ObjectHandle),
}

/// Anything that can hand out objects of a given size.
pub trait ObjectAllocator {
    fn allocate(&mut self, size_bytes: usize) -> Result<ObjectHandle, HeapError>;

    /// Allocates an instance of a class with the given static layout.
    fn allocate_instance(&mut self, layout: ClassLayout) -> Result<ObjectHandle, HeapError> {
        self.allocate(layout.instance_size)
    }
}
