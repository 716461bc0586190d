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
use std::time::Duration;

/// How the dispatch loop bounds a single burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase", tag = "type"))]
pub enum SchedulingPolicy {
    /// First come first served, runs every process to completion
    Fcfs,

    /// Round robin, preempts a process after `quantum` instructions
    #[cfg_attr(feature = "serde", serde(rename = "rr"))]
    RoundRobin { quantum: u64 },
}

/// Allocation discipline of the memory manager, derived from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    /// Non contiguous allocation of interchangeable frames
    Paging { frame_size: usize, frame_count: usize },

    /// First fit contiguous allocation over one occupancy unit per byte
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OSSimConfig {
    /// Number of simulated cores (one worker thread each)
    pub num_cores: usize,

    pub policy: SchedulingPolicy,

    /// Ticks to wait after every executed instruction
    pub delay_per_instruction: u64,

    /// Ticks between two processes created by the batch spawner
    pub batch_spawn_interval: u64,

    pub min_instructions: u64,
    pub max_instructions: u64,

    pub min_memory: usize,
    pub max_memory: usize,

    /// Size of the simulated main memory in bytes
    pub total_memory: usize,

    /// Frame size in bytes. If this equals `total_memory`, flat allocation is used.
    pub frame_size: usize,

    /// Wall time between two ticks of the virtual clock
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub tick_interval: Duration,

    /// Seed for instruction counts and memory sizes. Derived from the system time if unset.
    pub rng_seed: Option<u64>,

    /// File to keep the backing store ledger in. Kept in memory if unset.
    pub backing_store_path: Option<String>,

    /// How many bursts the scheduler remembers for reporting
    pub burst_history_limit: usize,
}

impl Default for OSSimConfig {
    fn default() -> Self {
        Self {
            num_cores: 4,
            policy: SchedulingPolicy::RoundRobin { quantum: 5 },
            delay_per_instruction: 0,
            batch_spawn_interval: 1,
            min_instructions: 1000,
            max_instructions: 2000,
            min_memory: 64,
            max_memory: 64,
            total_memory: 16384,
            frame_size: 16,
            tick_interval: Duration::from_millis(100),
            rng_seed: None,
            backing_store_path: None,
            burst_history_limit: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NoCores,
    ZeroQuantum,
    ZeroInstructions,
    InvalidInstructionRange,
    InvalidMemoryRange,
    ZeroMemory,
    ZeroFrameSize,
    FrameSizeExceedsMemory,
    /// `total_memory` is not a whole number of frames
    MemoryNotFrameAligned,
    ZeroTickInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfigError::NoCores => "num_cores has to be at least 1",
            ConfigError::ZeroQuantum => "round robin quantum has to be at least 1",
            ConfigError::ZeroInstructions => "min_instructions has to be at least 1",
            ConfigError::InvalidInstructionRange => "min_instructions is bigger than max_instructions",
            ConfigError::InvalidMemoryRange => "min_memory is bigger than max_memory",
            ConfigError::ZeroMemory => "total_memory has to be at least 1",
            ConfigError::ZeroFrameSize => "frame_size has to be at least 1",
            ConfigError::FrameSizeExceedsMemory => "frame_size is bigger than total_memory",
            ConfigError::MemoryNotFrameAligned => "total_memory is not a multiple of frame_size",
            ConfigError::ZeroTickInterval => "tick_interval has to be longer than zero",
        };
        f.write_str(text)
    }
}

impl OSSimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cores == 0 {
            return Err(ConfigError::NoCores);
        }
        if let SchedulingPolicy::RoundRobin { quantum: 0 } = self.policy {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.min_instructions == 0 {
            return Err(ConfigError::ZeroInstructions);
        }
        if self.min_instructions > self.max_instructions {
            return Err(ConfigError::InvalidInstructionRange);
        }
        if self.min_memory > self.max_memory {
            return Err(ConfigError::InvalidMemoryRange);
        }
        if self.total_memory == 0 {
            return Err(ConfigError::ZeroMemory);
        }
        if self.frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        if self.frame_size > self.total_memory {
            return Err(ConfigError::FrameSizeExceedsMemory);
        }
        if self.total_memory % self.frame_size != 0 {
            return Err(ConfigError::MemoryNotFrameAligned);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }

        Ok(())
    }

    pub fn memory_mode(&self) -> MemoryMode {
        if self.frame_size == self.total_memory {
            MemoryMode::Flat
        } else {
            MemoryMode::Paging {
                frame_size: self.frame_size,
                frame_count: self.total_memory / self.frame_size,
            }
        }
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
