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

use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use super::SchedulerShared;
use crate::{
    memory_manager::AdmissionError,
    os_sim_config::SchedulingPolicy,
    process::{Process, ProcessState},
    report::BurstRecord,
};

/// Dispatch loop of a single core
pub(super) fn run(shared: Arc<SchedulerShared>, core: usize) {
    debug!("core {} started", core);

    while shared.is_running() {
        // lock has to be released before idling
        let next = shared.dispatch().ready_queue.pop_front();
        let process = match next {
            Some(process) => process,
            None => {
                shared.clock.delay(1);
                continue;
            }
        };

        if process.is_finished() {
            debug!("dropping finished {} from the queue", process.name());
            continue;
        }

        if !admit(&shared, &process) {
            continue;
        }

        run_burst(&shared, core, process);
    }

    debug!("core {} stopped", core);
}

/// Makes sure `process` holds memory. Returns `false` if it can not run right now.
fn admit(shared: &SchedulerShared, process: &Arc<Process>) -> bool {
    match shared.memory.admit(process) {
        Ok(admission) => {
            if !admission.evicted.is_empty() {
                debug!(
                    "admitting {} evicted {:?}",
                    process.name(),
                    admission.evicted
                );
            }
            true
        }
        Err(AdmissionError::InsufficientMemory) => {
            trace!("{} is waiting for memory", process.name());
            process.set_state(ProcessState::WaitingForMemory);
            shared.dispatch().ready_queue.push_front(process.clone());
            shared.clock.delay(1);
            false
        }
        Err(AdmissionError::ExceedsCapacity) => {
            error!(
                "{} needs {} bytes which is more than the whole memory, it will never run",
                process.name(),
                process.memory_bytes()
            );
            process.set_state(ProcessState::Unadmittable);
            shared.dispatch().rejected.push(process.clone());
            false
        }
    }
}

/// Executes one burst of an admitted (and pinned) process on `core`
fn run_burst(shared: &SchedulerShared, core: usize, process: Arc<Process>) {
    let claim = match process.try_claim() {
        Some(claim) => claim,
        None => {
            // the core holding the claim owns the pin and requeues the process itself
            warn!(
                "{} is already executed somewhere else, dropping the duplicate",
                process.name()
            );
            return;
        }
    };

    if process.is_finished() {
        // finished by another core after this one admitted it
        drop(claim);
        shared.memory.release(&process);
        return;
    }

    process.set_assigned_core(Some(core));
    process.set_state(ProcessState::Running);
    shared.dispatch().set_running(core, Some(process.clone()));

    let budget = match shared.policy {
        SchedulingPolicy::Fcfs => u64::MAX,
        SchedulingPolicy::RoundRobin { quantum } => quantum,
    };

    let start_instruction = process.current_instruction();
    let mut finished = process.is_finished();
    let mut executed = 0;
    while !finished && executed < budget {
        finished = process.execute();
        executed += 1;
        shared.clock.delay(shared.delay_per_instruction);
    }
    let end_instruction = process.current_instruction();

    process.set_assigned_core(None);
    drop(claim);

    let record = BurstRecord {
        process: process.name().to_string(),
        core,
        start_instruction,
        end_instruction,
        finished,
    };

    if finished {
        shared.memory.release(&process);

        let mut dispatch = shared.dispatch();
        dispatch.set_running(core, None);
        dispatch.record_burst(record);
        dispatch.finished.push(process.clone());
        drop(dispatch);

        info!("{} finished on core {}", process.name(), core);
    } else {
        // the process may be evicted as soon as it is unpinned
        shared.memory.unpin(&process);

        let mut dispatch = shared.dispatch();
        dispatch.set_running(core, None);
        dispatch.record_burst(record);
        process.transition(ProcessState::Running, ProcessState::Ready);
        dispatch.ready_queue.push_back(process.clone());
        drop(dispatch);

        trace!(
            "{} preempted on core {} at {}/{}",
            process.name(),
            core,
            end_instruction,
            process.total_instructions()
        );
    }
}
