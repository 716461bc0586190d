mod flat;
mod paging;

pub use flat::FlatAllocatorModule;
pub use paging::{Frame, PagingAllocatorModule};

use crate::os_sim_config::{MemoryMode, OSSimConfig};

/// Region `[start, end)` of simulated main memory in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemoryRange {
    pub start: usize,
    pub end: usize,
}

impl MemoryRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Memory owned by a single resident process
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Placement {
    /// Frames of a paging allocator, not necessarily contiguous
    Frames(Vec<MemoryRange>),

    /// One contiguous region of a flat allocator
    Contiguous(MemoryRange),
}

impl Placement {
    /// Total size of this placement in bytes
    pub fn size(&self) -> usize {
        match self {
            Placement::Frames(frames) => frames.iter().map(MemoryRange::len).sum(),
            Placement::Contiguous(range) => range.len(),
        }
    }
}

/// A module that hands out simulated main memory to processes
pub trait MemoryAllocatorModule: Send {
    /// Size of the whole memory in bytes
    fn capacity(&self) -> usize;

    /// How many bytes will be reserved to satisfy a demand of `memory_bytes`
    /// (the demand rounded up to the allocation unit)
    fn reserved_size(&self, memory_bytes: usize) -> usize;

    /// Reserves memory for a demand of `memory_bytes`.
    ///
    /// Returns `Err(())` if the demand can not be satisfied with the currently free memory.
    fn allocate(&mut self, memory_bytes: usize) -> Result<Placement, ()>;

    /// Returns the memory of `placement`.
    ///
    /// Units that are already free are skipped.
    fn release(&mut self, placement: &Placement);

    /// Currently free bytes
    fn free_bytes(&self) -> usize;

    /// Free bytes that are not usable as one piece, see `MemoryStats`
    fn external_fragmentation(&self) -> usize;

    fn used_bytes(&self) -> usize {
        self.capacity() - self.free_bytes()
    }

    /// Could `memory_bytes` be allocated if the memory was empty?
    fn can_ever_fit(&self, memory_bytes: usize) -> bool {
        self.reserved_size(memory_bytes) <= self.capacity()
    }
}

impl<T: MemoryAllocatorModule + ?Sized> MemoryAllocatorModule for Box<T> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn reserved_size(&self, memory_bytes: usize) -> usize {
        (**self).reserved_size(memory_bytes)
    }

    fn allocate(&mut self, memory_bytes: usize) -> Result<Placement, ()> {
        (**self).allocate(memory_bytes)
    }

    fn release(&mut self, placement: &Placement) {
        (**self).release(placement)
    }

    fn free_bytes(&self) -> usize {
        (**self).free_bytes()
    }

    fn external_fragmentation(&self) -> usize {
        (**self).external_fragmentation()
    }
}

/// Creates the allocator module that matches the memory mode of `config`
pub fn allocator_from_config(config: &OSSimConfig) -> Box<dyn MemoryAllocatorModule> {
    match config.memory_mode() {
        MemoryMode::Paging {
            frame_size,
            frame_count,
        } => Box::new(PagingAllocatorModule::new(frame_size, frame_count)),
        MemoryMode::Flat => Box::new(FlatAllocatorModule::new(config.total_memory, 1)),
    }
}
