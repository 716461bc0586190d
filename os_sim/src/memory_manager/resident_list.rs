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

use crate::{
    modules::allocator::Placement,
    process::{Process, ProcessId},
};

/// A process that currently holds main memory
pub(crate) struct ResidentEntry {
    pub(crate) process: Arc<Process>,
    pub(crate) placement: Placement,

    /// Pinned processes are dispatched right now and must not be evicted
    pub(crate) pinned: bool,
}

/// Resident processes in admission order, oldest first
pub(crate) struct ResidentList {
    entries: VecDeque<ResidentEntry>,
}

impl ResidentList {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends a newly admitted process, making it the youngest entry
    pub(crate) fn push(&mut self, entry: ResidentEntry) {
        debug_assert!(self.position(entry.process.id()).is_none());
        self.entries.push_back(entry);
    }

    #[inline]
    fn position(&self, id: ProcessId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.process.id() == id)
    }

    pub(crate) fn contains(&self, id: ProcessId) -> bool {
        self.position(id).is_some()
    }

    pub(crate) fn get_mut(&mut self, id: ProcessId) -> Option<&mut ResidentEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.process.id() == id)
    }

    pub(crate) fn remove(&mut self, id: ProcessId) -> Option<ResidentEntry> {
        let index = self.position(id)?;
        self.entries.remove(index)
    }

    /// Removes the oldest entry that is not pinned
    pub(crate) fn pop_oldest_unpinned(&mut self) -> Option<ResidentEntry> {
        let index = self.entries.iter().position(|entry| !entry.pinned)?;
        self.entries.remove(index)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ResidentEntry> {
        self.entries.iter()
    }
}
