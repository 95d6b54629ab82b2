/// Reference to an object allocated in the `GenerationalHeap`.
///
/// Handles stay valid until the object they point to is reclaimed. Slots of
/// reclaimed objects are reused, the epoch tells a stale handle apart from a
/// handle to the slot's current occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    index: usize,
    epoch: u32,
}

impl ObjectHandle {
    pub(crate) fn new(index: usize, epoch: u32) -> Self {
        Self { index, epoch }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}
