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

//! Plain data snapshots handed out to reporting collaborators.
//!
//! Snapshots are copied out while holding the lock of the owning component
//! and may be slightly stale, but are never torn.

use crate::process::{ProcessId, ProcessState};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    pub name: String,

    /// Seconds since the unix epoch
    pub creation_time: u64,
    pub creation_tick: u64,

    pub state: ProcessState,
    pub current_instruction: u64,
    pub total_instructions: u64,
    pub memory_bytes: usize,
    pub memory_allocated: bool,
    pub assigned_core: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemoryStats {
    pub total_bytes: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,

    /// Free bytes that can not be used by a request as big as all free memory
    /// together, i.e. everything outside of the biggest free hole.
    /// Always zero for paging, as frames are interchangeable.
    pub external_fragmentation_bytes: usize,

    /// Number of processes holding memory
    pub resident_processes: usize,

    /// Evictions since start
    pub evictions: u64,
}

/// One dispatch of a process onto a core
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BurstRecord {
    pub process: String,
    pub core: usize,

    /// Instruction counter when the burst started
    pub start_instruction: u64,

    /// Instruction counter when the burst ended
    pub end_instruction: u64,
    pub finished: bool,
}

impl BurstRecord {
    pub fn executed(&self) -> u64 {
        self.end_instruction - self.start_instruction
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SystemSnapshot {
    pub tick: u64,

    /// Percent of cores that currently run a process
    pub cpu_utilization: f64,
    pub cores_used: usize,
    pub cores_available: usize,

    pub running: Vec<ProcessSnapshot>,
    pub queued: Vec<ProcessSnapshot>,
    pub finished: Vec<ProcessSnapshot>,
    pub rejected: Vec<ProcessSnapshot>,

    pub memory: MemoryStats,

    /// Names currently in the backing store
    pub swapped_out: Vec<String>,
}
