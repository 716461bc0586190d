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

mod batch_spawner;
mod memory_manager;
mod os_sim_config;
mod os_simulator;
mod process;
mod report;
mod scheduler;
mod util;
mod virtual_clock;

#[cfg(test)]
mod test;

pub use batch_spawner::{BatchSpawner, SpawnerError};
pub use memory_manager::{Admission, AdmissionError, IntegrityError, MemoryManager};
pub use os_sim_config::{ConfigError, MemoryMode, OSSimConfig, SchedulingPolicy};
pub use os_simulator::{InitError, OSSimulator, ProcessRequest, SubmitError};
pub use process::{Process, ProcessId, ProcessState};
pub use report::{BurstRecord, MemoryStats, ProcessSnapshot, SystemSnapshot};
pub use scheduler::Scheduler;
pub use virtual_clock::{ClockError, VirtualClock, TICK_WRAP};
pub mod modules;

static_assertions::assert_impl_all!(Process: Send, Sync);
static_assertions::assert_impl_all!(MemoryManager: Send, Sync);
static_assertions::assert_impl_all!(Scheduler: Send, Sync);
static_assertions::assert_impl_all!(VirtualClock: Send, Sync);
static_assertions::assert_impl_all!(OSSimulator: Send, Sync);
