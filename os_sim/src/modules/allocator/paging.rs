use log::warn;

use super::{MemoryAllocatorModule, MemoryRange, Placement};
use crate::util::ceil_div;

/// Fixed size unit of paged memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub start: usize,
    pub end: usize,
    pub free: bool,
}

/// Paging allocator: hands out any free frames, they don't have to be contiguous
pub struct PagingAllocatorModule {
    frame_size: usize,
    frames: Vec<Frame>,

    /// Indices of free frames, the next frame to hand out is at the end
    free_frames: Vec<usize>,
}

impl PagingAllocatorModule {
    pub fn new(frame_size: usize, frame_count: usize) -> Self {
        assert!(frame_size > 0, "frame size has to be bigger than zero");

        let frames = (0..frame_count)
            .map(|i| Frame {
                start: i * frame_size,
                end: (i + 1) * frame_size,
                free: true,
            })
            .collect();

        Self {
            frame_size,
            frames,
            // lowest frames are handed out first
            free_frames: (0..frame_count).rev().collect(),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    fn frames_required(&self, memory_bytes: usize) -> usize {
        ceil_div(memory_bytes, self.frame_size)
    }
}

impl MemoryAllocatorModule for PagingAllocatorModule {
    fn capacity(&self) -> usize {
        self.frames.len() * self.frame_size
    }

    fn reserved_size(&self, memory_bytes: usize) -> usize {
        // saturates so huge demands still compare larger than the capacity
        self.frames_required(memory_bytes).saturating_mul(self.frame_size)
    }

    fn allocate(&mut self, memory_bytes: usize) -> Result<Placement, ()> {
        let required = self.frames_required(memory_bytes);
        if required > self.free_frames.len() {
            return Err(());
        }

        let mut ranges = Vec::with_capacity(required);
        for _ in 0..required {
            let index = self.free_frames.pop().ok_or(())?;
            let frame = &mut self.frames[index];
            debug_assert!(frame.free, "frame {} in free list is not free", index);

            frame.free = false;
            ranges.push(MemoryRange {
                start: frame.start,
                end: frame.end,
            });
        }

        Ok(Placement::Frames(ranges))
    }

    fn release(&mut self, placement: &Placement) {
        let ranges = match placement {
            Placement::Frames(ranges) => ranges,
            Placement::Contiguous(range) => {
                warn!(
                    "paging allocator got a contiguous placement [{}, {})",
                    range.start, range.end
                );
                return;
            }
        };

        for range in ranges {
            let index = range.start / self.frame_size;
            let Some(frame) = self.frames.get_mut(index) else {
                warn!("release of unknown frame at {}", range.start);
                continue;
            };

            if frame.free {
                // already released, do not hand it out twice
                warn!("frame {} is already free", index);
                continue;
            }

            frame.free = true;
            self.free_frames.push(index);
        }
    }

    fn free_bytes(&self) -> usize {
        self.free_frames.len() * self.frame_size
    }

    fn external_fragmentation(&self) -> usize {
        // frames are interchangeable
        0
    }
}
