/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, trace, warn};

use crate::{
    modules::{
        allocator::{MemoryAllocatorModule, MemoryRange, Placement},
        backing_store::BackingStoreModule,
    },
    process::{Process, ProcessState},
    report::MemoryStats,
    util::lock_recover,
};

use resident_list::{ResidentEntry, ResidentList};

pub(crate) mod resident_list;

#[cfg(test)]
mod test;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// The demand is bigger than the whole memory, retrying will never help
    ExceedsCapacity,

    /// Not enough memory even after evicting every process that is not running
    InsufficientMemory,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::ExceedsCapacity => f.write_str("memory demand exceeds total memory"),
            AdmissionError::InsufficientMemory => f.write_str("not enough evictable memory"),
        }
    }
}

/// Result of a successful admission
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Admission {
    /// Processes that were swapped out to make room, oldest first
    pub evicted: Vec<String>,

    /// The process already held memory, nothing was allocated
    pub already_resident: bool,
}

/// Inconsistency between the resident list and the allocator tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    UsedBytesMismatch { resident: usize, allocator: usize },
    OverlappingPlacements,
    DuplicateResident,
    AllocationFlagMismatch,
}

struct MemoryManagerInner<A: MemoryAllocatorModule, B: BackingStoreModule> {
    allocator: A,
    resident_list: ResidentList,
    backing_store: B,
    evictions: u64,
}

/// Decides which processes hold main memory.
///
/// Every process that is dispatched has to be admitted first. Admission pins the process,
/// pinned processes are never chosen as eviction victims. If memory runs out, the oldest
/// resident process that is not pinned is swapped out and written to the backing store ledger.
pub struct MemoryManager<
    A: MemoryAllocatorModule = Box<dyn MemoryAllocatorModule>,
    B: BackingStoreModule = Box<dyn BackingStoreModule>,
> {
    inner: Mutex<MemoryManagerInner<A, B>>,
}

impl<A: MemoryAllocatorModule, B: BackingStoreModule> MemoryManager<A, B> {
    pub fn new(allocator: A, backing_store: B) -> Self {
        Self {
            inner: Mutex::new(MemoryManagerInner {
                allocator,
                resident_list: ResidentList::new(),
                backing_store,
                evictions: 0,
            }),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, MemoryManagerInner<A, B>> {
        lock_recover(&self.inner)
    }

    /// Could a process with a demand of `memory_bytes` ever be admitted?
    pub fn can_ever_fit(&self, memory_bytes: usize) -> bool {
        self.lock().allocator.can_ever_fit(memory_bytes)
    }

    /// Makes `process` resident (if it is not already) and pins it.
    pub fn admit(&self, process: &Arc<Process>) -> Result<Admission, AdmissionError> {
        let mut inner = self.lock();
        let res = inner.admit(process);

        debug_assert_eq!(inner.check_integrity(), Ok(()));

        res
    }

    /// Returns the memory of `process`.
    ///
    /// Returns `false` if the process was not resident, releasing twice does nothing.
    pub fn release(&self, process: &Process) -> bool {
        let mut inner = self.lock();
        let entry = match inner.resident_list.remove(process.id()) {
            Some(entry) => entry,
            None => {
                trace!("{} is not resident, nothing to release", process.name());
                return false;
            }
        };

        inner.allocator.release(&entry.placement);
        process.set_memory_allocated(false);
        debug!(
            "released {} bytes of {}",
            entry.placement.size(),
            process.name()
        );

        debug_assert_eq!(inner.check_integrity(), Ok(()));

        true
    }

    /// Allows `process` to be evicted again. Returns `false` if it is not resident.
    pub fn unpin(&self, process: &Process) -> bool {
        let mut inner = self.lock();
        match inner.resident_list.get_mut(process.id()) {
            Some(entry) => {
                entry.pinned = false;
                true
            }
            None => false,
        }
    }

    pub fn is_resident(&self, process: &Process) -> bool {
        self.lock().resident_list.contains(process.id())
    }

    pub fn stats(&self) -> MemoryStats {
        let inner = self.lock();
        MemoryStats {
            total_bytes: inner.allocator.capacity(),
            used_bytes: inner.allocator.used_bytes(),
            free_bytes: inner.allocator.free_bytes(),
            external_fragmentation_bytes: inner.allocator.external_fragmentation(),
            resident_processes: inner.resident_list.len(),
            evictions: inner.evictions,
        }
    }

    /// Names of all resident processes, oldest admission first
    pub fn resident_names(&self) -> Vec<String> {
        self.lock()
            .resident_list
            .iter()
            .map(|entry| entry.process.name().to_string())
            .collect()
    }

    /// Contents of the backing store ledger
    pub fn swapped_out(&self) -> Vec<String> {
        self.lock().backing_store.entries()
    }

    /// Checks that the resident list and the allocator agree on the used memory
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        self.lock().check_integrity()
    }
}

impl<A: MemoryAllocatorModule, B: BackingStoreModule> MemoryManagerInner<A, B> {
    fn admit(&mut self, process: &Arc<Process>) -> Result<Admission, AdmissionError> {
        if let Some(entry) = self.resident_list.get_mut(process.id()) {
            entry.pinned = true;
            return Ok(Admission {
                evicted: Vec::new(),
                already_resident: true,
            });
        }

        let demand = process.memory_bytes();
        if !self.allocator.can_ever_fit(demand) {
            return Err(AdmissionError::ExceedsCapacity);
        }

        // no need to evict anything if it can not be enough anyway
        let reserved = self.allocator.reserved_size(demand);
        let evictable: usize = self
            .resident_list
            .iter()
            .filter(|entry| !entry.pinned)
            .map(|entry| entry.placement.size())
            .sum();
        if self.allocator.free_bytes() + evictable < reserved {
            trace!(
                "{} needs {} bytes but only {} are free or evictable",
                process.name(),
                reserved,
                self.allocator.free_bytes() + evictable
            );
            return Err(AdmissionError::InsufficientMemory);
        }

        let mut evicted = Vec::new();
        let placement = loop {
            if let Ok(placement) = self.allocator.allocate(demand) {
                break placement;
            }

            debug!(
                "could not allocate {} bytes for {}, try to evict other processes...",
                demand,
                process.name()
            );

            match self.evict_oldest() {
                Some(name) => evicted.push(name),
                None => {
                    warn!(
                        "-> could not allocate {} bytes for {} (evicted {} processes)",
                        demand,
                        process.name(),
                        evicted.len()
                    );
                    return Err(AdmissionError::InsufficientMemory);
                }
            }
        };

        match self.backing_store.remove(process.name()) {
            Ok(true) => debug!("{} was swapped in again", process.name()),
            Ok(false) => {}
            Err(()) => warn!("could not remove {} from backing store", process.name()),
        }

        trace!(
            "admitted {} with {} bytes ({:?})",
            process.name(),
            placement.size(),
            placement
        );

        self.resident_list.push(ResidentEntry {
            process: process.clone(),
            placement,
            pinned: true,
        });
        process.set_memory_allocated(true);

        Ok(Admission {
            evicted,
            already_resident: false,
        })
    }

    /// Swaps out the oldest resident process that is not pinned.
    ///
    /// The victim is not enqueued anywhere, it is already waiting in the ready queue.
    fn evict_oldest(&mut self) -> Option<String> {
        let victim = self.resident_list.pop_oldest_unpinned()?;
        let process = victim.process;

        self.allocator.release(&victim.placement);
        process.set_memory_allocated(false);
        process.set_state(ProcessState::SwappedOut);

        if self.backing_store.store(process.name()).is_err() {
            warn!("could not write {} to backing store", process.name());
        }
        self.evictions += 1;

        info!(
            "evicted {} ({} bytes) to backing store",
            process.name(),
            victim.placement.size()
        );
        Some(process.name().to_string())
    }

    fn check_integrity(&self) -> Result<(), IntegrityError> {
        let mut resident_bytes = 0;
        let mut ranges: Vec<MemoryRange> = Vec::new();

        for (i, entry) in self.resident_list.iter().enumerate() {
            if !entry.process.is_memory_allocated() {
                return Err(IntegrityError::AllocationFlagMismatch);
            }

            let duplicate = self
                .resident_list
                .iter()
                .skip(i + 1)
                .any(|other| other.process.id() == entry.process.id());
            if duplicate {
                return Err(IntegrityError::DuplicateResident);
            }

            resident_bytes += entry.placement.size();
            match &entry.placement {
                Placement::Frames(frames) => ranges.extend(frames.iter().copied()),
                Placement::Contiguous(range) => ranges.push(*range),
            }
        }

        ranges.retain(|range| !range.is_empty());
        ranges.sort_by_key(|range| range.start);
        if ranges.windows(2).any(|pair| pair[0].end > pair[1].start) {
            return Err(IntegrityError::OverlappingPlacements);
        }

        let allocator_bytes = self.allocator.used_bytes();
        if resident_bytes != allocator_bytes {
            return Err(IntegrityError::UsedBytesMismatch {
                resident: resident_bytes,
                allocator: allocator_bytes,
            });
        }

        Ok(())
    }
}
