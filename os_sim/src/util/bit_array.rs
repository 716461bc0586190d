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

use super::ceil_div;

/// Fixed length array of bits, one bit per occupancy unit.
pub(crate) struct BitArray {
    arr: Vec<u8>,
    len: usize,
    set_count: usize,
}

impl BitArray {
    /// Creates a new bit array with `len` unset bits
    pub(crate) fn new(len: usize) -> Self {
        BitArray {
            arr: vec![0u8; ceil_div(len, 8)],
            len,
            set_count: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// How many bits are currently set
    pub(crate) fn count_set(&self) -> usize {
        self.set_count
    }

    pub(crate) fn set(&mut self, value: bool, index: usize) {
        debug_assert!(index < self.len, "index {} out of bounds ({})", index, self.len);

        let arr_index = index / 8;
        let internal_index = index % 8;

        let was_set = self.is_set(index);
        let item = &mut self.arr[arr_index];
        if value {
            // set bit
            *item |= 1u8 << internal_index;
            if !was_set {
                self.set_count += 1;
            }
        } else {
            // unset bit
            *item &= !(1u8 << internal_index);
            if was_set {
                self.set_count -= 1;
            }
        }
    }

    /// Sets all bits of `[start, end)` to `value`
    pub(crate) fn set_range(&mut self, value: bool, start: usize, end: usize) {
        for index in start..end {
            self.set(value, index);
        }
    }

    pub(crate) fn is_set(&self, index: usize) -> bool {
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = self.arr[arr_index];
        (item & (1u8 << internal_index)) != 0
    }

    /// Returns the first run of `count` unset bits as `[start, start + count)`
    pub(crate) fn find_unset_run(&self, count: usize) -> Option<usize> {
        if count == 0 || count > self.len {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        for index in 0..self.len {
            if self.is_set(index) {
                run_len = 0;
                run_start = index + 1;
                continue;
            }

            run_len += 1;
            if run_len == count {
                return Some(run_start);
            }
        }

        None
    }

    /// Length of the longest run of unset bits
    pub(crate) fn longest_unset_run(&self) -> usize {
        let mut longest = 0;
        let mut curr = 0;
        for index in 0..self.len {
            if self.is_set(index) {
                curr = 0;
            } else {
                curr += 1;
                longest = longest.max(curr);
            }
        }

        longest
    }
}
