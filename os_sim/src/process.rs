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
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use try_lock::{Locked, TryLock};

use crate::{report::ProcessSnapshot, util::lock_recover};

/// Stable identifier of a process, assigned by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ProcessState {
    Created,
    Ready,
    Running,
    WaitingForMemory,
    SwappedOut,
    Finished,

    /// Memory demand is bigger than the whole system memory, will never run
    Unadmittable,
}

/// Marker for `assigned_core` if the process is not running
const NO_CORE: usize = usize::MAX;

/// Unit of schedulable work.
///
/// A process is shared between the ready queue, the running slots, the resident list
/// of the memory manager and the registry of the simulator. Progress is only ever
/// advanced by the worker that claimed it (see `try_claim`), all other parties only read.
pub struct Process {
    id: ProcessId,
    name: String,

    /// Wall clock creation time
    created_at: SystemTime,

    /// Virtual clock tick at creation
    created_tick: u64,

    total_instructions: u64,
    memory_bytes: usize,

    current_instruction: AtomicU64,
    assigned_core: AtomicUsize,
    memory_allocated: AtomicBool,
    state: Mutex<ProcessState>,

    /// Held by the worker that currently executes this process
    execution_lock: TryLock<()>,
}

impl Process {
    pub fn new(
        id: ProcessId,
        name: String,
        total_instructions: u64,
        memory_bytes: usize,
        created_tick: u64,
    ) -> Self {
        Self {
            id,
            name,
            created_at: SystemTime::now(),
            created_tick,
            total_instructions,
            memory_bytes,
            current_instruction: AtomicU64::new(0),
            assigned_core: AtomicUsize::new(NO_CORE),
            memory_allocated: AtomicBool::new(false),
            state: Mutex::new(ProcessState::Created),
            execution_lock: TryLock::new(()),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn created_tick(&self) -> u64 {
        self.created_tick
    }

    pub fn total_instructions(&self) -> u64 {
        self.total_instructions
    }

    pub fn current_instruction(&self) -> u64 {
        self.current_instruction.load(Ordering::Acquire)
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    /// Executes a single instruction. Returns `true` if the process finished with it.
    ///
    /// Executing a finished process does nothing.
    pub fn execute(&self) -> bool {
        let res = self
            .current_instruction
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |curr| {
                if curr < self.total_instructions {
                    Some(curr + 1)
                } else {
                    None
                }
            });

        match res {
            Ok(prev) if prev + 1 == self.total_instructions => {
                self.set_state(ProcessState::Finished);
                true
            }
            Ok(_) => false,
            Err(_) => true,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_instruction() >= self.total_instructions
    }

    pub fn state(&self) -> ProcessState {
        *lock_recover(&self.state)
    }

    pub(crate) fn set_state(&self, state: ProcessState) {
        *lock_recover(&self.state) = state;
    }

    /// Changes the state to `new` only if it is `expected` right now
    pub(crate) fn transition(&self, expected: ProcessState, new: ProcessState) -> bool {
        let mut state = lock_recover(&self.state);
        if *state == expected {
            *state = new;
            true
        } else {
            false
        }
    }

    pub fn assigned_core(&self) -> Option<usize> {
        match self.assigned_core.load(Ordering::Acquire) {
            NO_CORE => None,
            core => Some(core),
        }
    }

    pub(crate) fn set_assigned_core(&self, core: Option<usize>) {
        self.assigned_core
            .store(core.unwrap_or(NO_CORE), Ordering::Release);
    }

    pub fn is_memory_allocated(&self) -> bool {
        self.memory_allocated.load(Ordering::Acquire)
    }

    pub(crate) fn set_memory_allocated(&self, allocated: bool) {
        self.memory_allocated.store(allocated, Ordering::Release);
    }

    /// Claims this process for execution.
    ///
    /// Returns `None` if some other worker is executing this process right now.
    pub(crate) fn try_claim(&self) -> Option<Locked<'_, ()>> {
        self.execution_lock.try_lock()
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id,
            name: self.name.clone(),
            creation_time: self
                .created_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            creation_tick: self.created_tick,
            state: self.state(),
            current_instruction: self.current_instruction(),
            total_instructions: self.total_instructions,
            memory_bytes: self.memory_bytes,
            memory_allocated: self.is_memory_allocated(),
            assigned_core: self.assigned_core(),
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("current_instruction", &self.current_instruction())
            .field("total_instructions", &self.total_instructions)
            .field("memory_bytes", &self.memory_bytes)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{Process, ProcessId, ProcessState};

    fn test_process(total: u64) -> Process {
        Process::new(ProcessId(1), "p1".into(), total, 64, 0)
    }

    #[test]
    fn test_execute_until_finished() {
        let process = test_process(3);
        assert_eq!(process.state(), ProcessState::Created);
        assert_eq!(process.current_instruction(), 0);

        assert!(!process.execute());
        assert!(!process.execute());
        assert!(!process.is_finished());
        assert!(process.execute());

        assert!(process.is_finished());
        assert_eq!(process.state(), ProcessState::Finished);
        assert_eq!(process.current_instruction(), 3);

        // executing a finished process is a no op
        assert!(process.execute());
        assert_eq!(process.current_instruction(), 3);
    }

    #[test]
    fn test_assigned_core() {
        let process = test_process(3);
        assert_eq!(process.assigned_core(), None);

        process.set_assigned_core(Some(2));
        assert_eq!(process.assigned_core(), Some(2));
        assert_eq!(process.snapshot().assigned_core, Some(2));

        process.set_assigned_core(None);
        assert_eq!(process.assigned_core(), None);
    }

    #[test]
    fn test_transition() {
        let process = test_process(3);
        process.set_state(ProcessState::Running);

        assert!(process.transition(ProcessState::Running, ProcessState::Ready));
        assert_eq!(process.state(), ProcessState::Ready);

        process.set_state(ProcessState::SwappedOut);
        assert!(!process.transition(ProcessState::Running, ProcessState::Ready));
        assert_eq!(process.state(), ProcessState::SwappedOut);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let process = test_process(3);

        let claim = process.try_claim();
        assert!(claim.is_some());
        assert!(process.try_claim().is_none());

        drop(claim);
        assert!(process.try_claim().is_some());
    }
}
