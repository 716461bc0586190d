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

use std::{collections::VecDeque, sync::Arc};

use crate::{process::Process, report::BurstRecord};

/// Everything that is protected by the dispatch lock
pub(crate) struct DispatchState {
    pub(crate) ready_queue: VecDeque<Arc<Process>>,

    /// Process currently running on each core
    pub(crate) running: Vec<Option<Arc<Process>>>,

    pub(crate) finished: Vec<Arc<Process>>,

    /// Processes that can never be admitted
    pub(crate) rejected: Vec<Arc<Process>>,

    bursts: VecDeque<BurstRecord>,
    burst_limit: usize,
}

impl DispatchState {
    pub(crate) fn new(num_cores: usize, burst_limit: usize) -> Self {
        Self {
            ready_queue: VecDeque::new(),
            running: vec![None; num_cores],
            finished: Vec::new(),
            rejected: Vec::new(),
            bursts: VecDeque::new(),
            burst_limit,
        }
    }

    /// Is `process` queued, running or already done?
    pub(crate) fn holds(&self, process: &Arc<Process>) -> bool {
        let same = |other: &Arc<Process>| Arc::ptr_eq(other, process);
        self.ready_queue.iter().any(same)
            || self.running.iter().flatten().any(same)
            || self.finished.iter().any(same)
            || self.rejected.iter().any(same)
    }

    pub(crate) fn cores_used(&self) -> usize {
        self.running.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn set_running(&mut self, core: usize, process: Option<Arc<Process>>) {
        self.running[core] = process;
    }

    /// Appends `record` and drops the oldest records above the limit
    pub(crate) fn record_burst(&mut self, record: BurstRecord) {
        if self.burst_limit == 0 {
            return;
        }
        while self.bursts.len() >= self.burst_limit {
            self.bursts.pop_front();
        }
        self.bursts.push_back(record);
    }

    pub(crate) fn bursts(&self) -> Vec<BurstRecord> {
        self.bursts.iter().cloned().collect()
    }
}
