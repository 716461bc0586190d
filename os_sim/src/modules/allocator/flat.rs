use log::warn;

use super::{MemoryAllocatorModule, MemoryRange, Placement};
use crate::util::{bit_array::BitArray, ceil_div};

/// Flat allocator module that uses first fit over an occupancy array.
///
/// No compaction is done, freed holes stay where they are.
pub struct FlatAllocatorModule {
    unit_size: usize,

    /// One bit per unit, set if occupied
    occupancy: BitArray,
}

impl FlatAllocatorModule {
    /// Creates a new module managing `total_memory` bytes in units of `unit_size` bytes
    pub fn new(total_memory: usize, unit_size: usize) -> Self {
        assert!(unit_size > 0, "unit size has to be bigger than zero");

        Self {
            unit_size,
            occupancy: BitArray::new(total_memory / unit_size),
        }
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn free_unit_count(&self) -> usize {
        self.occupancy.len() - self.occupancy.count_set()
    }

    fn units_required(&self, memory_bytes: usize) -> usize {
        ceil_div(memory_bytes, self.unit_size)
    }
}

impl MemoryAllocatorModule for FlatAllocatorModule {
    fn capacity(&self) -> usize {
        self.occupancy.len() * self.unit_size
    }

    fn reserved_size(&self, memory_bytes: usize) -> usize {
        // saturates so huge demands still compare larger than the capacity
        self.units_required(memory_bytes).saturating_mul(self.unit_size)
    }

    fn allocate(&mut self, memory_bytes: usize) -> Result<Placement, ()> {
        let units = self.units_required(memory_bytes);
        if units == 0 {
            return Ok(Placement::Contiguous(MemoryRange { start: 0, end: 0 }));
        }

        let start = self.occupancy.find_unset_run(units).ok_or(())?;
        self.occupancy.set_range(true, start, start + units);

        Ok(Placement::Contiguous(MemoryRange {
            start: start * self.unit_size,
            end: (start + units) * self.unit_size,
        }))
    }

    fn release(&mut self, placement: &Placement) {
        let range = match placement {
            Placement::Contiguous(range) => range,
            Placement::Frames(_) => {
                warn!("flat allocator got a paged placement");
                return;
            }
        };

        let start = range.start / self.unit_size;
        let end = (range.end / self.unit_size).min(self.occupancy.len());
        self.occupancy.set_range(false, start, end);
    }

    fn free_bytes(&self) -> usize {
        self.free_unit_count() * self.unit_size
    }

    fn external_fragmentation(&self) -> usize {
        (self.free_unit_count() - self.occupancy.longest_unset_run()) * self.unit_size
    }
}
