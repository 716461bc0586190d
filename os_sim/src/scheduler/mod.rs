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

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use dispatch_state::DispatchState;
use log::{debug, error, info, trace, warn};

use crate::{
    memory_manager::MemoryManager,
    os_sim_config::{OSSimConfig, SchedulingPolicy},
    process::{Process, ProcessState},
    report::{BurstRecord, SystemSnapshot},
    util::lock_recover,
    virtual_clock::VirtualClock,
};

mod dispatch_state;
mod worker;

/// State shared between the scheduler handle and its workers
pub(crate) struct SchedulerShared {
    num_cores: usize,
    policy: SchedulingPolicy,
    delay_per_instruction: u64,

    clock: Arc<VirtualClock>,
    memory: Arc<MemoryManager>,

    /// Never held together with the memory manager lock
    dispatch: Mutex<DispatchState>,

    /// Workers exit once this is cleared
    running: AtomicBool,
}

impl SchedulerShared {
    #[inline]
    fn dispatch(&self) -> MutexGuard<'_, DispatchState> {
        lock_recover(&self.dispatch)
    }

    #[inline]
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Multi core dispatcher. Every core is simulated by one worker thread that
/// takes processes from the shared ready queue.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Creates a new scheduler. No worker runs until `start` is called.
    pub fn new(config: &OSSimConfig, clock: Arc<VirtualClock>, memory: Arc<MemoryManager>) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                num_cores: config.num_cores,
                policy: config.policy,
                delay_per_instruction: config.delay_per_instruction,
                clock,
                memory,
                dispatch: Mutex::new(DispatchState::new(
                    config.num_cores,
                    config.burst_history_limit,
                )),
                running: AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns one worker per core
    pub fn start(&self) -> std::io::Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("scheduler is already running");
            return Ok(());
        }

        let mut workers = lock_recover(&self.workers);
        for core in 0..self.shared.num_cores {
            let shared = self.shared.clone();
            let res = thread::Builder::new()
                .name(format!("core-{}", core))
                .spawn(move || worker::run(shared, core));

            match res {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    error!("could not spawn worker for core {}: {}", core, err);
                    drop(workers);
                    self.shutdown();
                    return Err(err);
                }
            }
        }

        info!(
            "scheduler started with {} cores ({:?})",
            self.shared.num_cores, self.shared.policy
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Appends `process` to the ready queue.
    ///
    /// Returns `false` and leaves the process alone if the scheduler already
    /// knows this handle.
    pub fn submit(&self, process: Arc<Process>) -> bool {
        let mut dispatch = self.shared.dispatch();
        Self::enqueue(&mut dispatch, process)
    }

    /// Appends all `processes` at once, no worker can dequeue in between.
    ///
    /// Returns how many of them were queued, see [`Scheduler::submit`].
    pub fn submit_all<I: IntoIterator<Item = Arc<Process>>>(&self, processes: I) -> usize {
        let mut dispatch = self.shared.dispatch();
        processes
            .into_iter()
            .filter(|process| Self::enqueue(&mut dispatch, process.clone()))
            .count()
    }

    fn enqueue(dispatch: &mut DispatchState, process: Arc<Process>) -> bool {
        if dispatch.holds(&process) {
            warn!("{} was submitted twice, ignoring it", process.name());
            return false;
        }

        process.set_state(ProcessState::Ready);
        trace!("submitted {}", process.name());
        dispatch.ready_queue.push_back(process);
        true
    }

    /// Stops all workers and waits for them.
    ///
    /// Workers finish their current burst first, so the clock has to keep ticking
    /// until this returns.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let workers: Vec<JoinHandle<()>> = lock_recover(&self.workers).drain(..).collect();
        if workers.is_empty() {
            return;
        }

        for handle in workers {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        debug!("all workers stopped");
    }

    pub fn num_cores(&self) -> usize {
        self.shared.num_cores
    }

    pub fn cores_used(&self) -> usize {
        self.shared.dispatch().cores_used()
    }

    pub fn cores_available(&self) -> usize {
        self.shared.num_cores - self.cores_used()
    }

    /// Percent of cores that run a process right now
    pub fn cpu_utilization(&self) -> f64 {
        utilization(self.cores_used(), self.shared.num_cores)
    }

    pub fn burst_history(&self) -> Vec<BurstRecord> {
        self.shared.dispatch().bursts()
    }

    /// Copies the current state. Dispatch and memory state are read one after another.
    pub fn snapshot(&self) -> SystemSnapshot {
        let tick = self.shared.clock.now();

        let (running, queued, finished, rejected, cores_used) = {
            let dispatch = self.shared.dispatch();
            (
                dispatch
                    .running
                    .iter()
                    .flatten()
                    .map(|p| p.snapshot())
                    .collect::<Vec<_>>(),
                dispatch
                    .ready_queue
                    .iter()
                    .map(|p| p.snapshot())
                    .collect::<Vec<_>>(),
                dispatch
                    .finished
                    .iter()
                    .map(|p| p.snapshot())
                    .collect::<Vec<_>>(),
                dispatch
                    .rejected
                    .iter()
                    .map(|p| p.snapshot())
                    .collect::<Vec<_>>(),
                dispatch.cores_used(),
            )
        };

        let memory = self.shared.memory.stats();
        let swapped_out = self.shared.memory.swapped_out();

        SystemSnapshot {
            tick,
            cpu_utilization: utilization(cores_used, self.shared.num_cores),
            cores_used,
            cores_available: self.shared.num_cores - cores_used,
            running,
            queued,
            finished,
            rejected,
            memory,
            swapped_out,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[inline]
fn utilization(cores_used: usize, num_cores: usize) -> f64 {
    if num_cores == 0 {
        return 0.0;
    }
    cores_used as f64 * 100.0 / num_cores as f64
}
