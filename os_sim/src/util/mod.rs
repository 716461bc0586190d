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

pub(crate) mod bit_array;

use std::sync::{Mutex, MutexGuard};

use log::warn;

/// efficient way to calculate: ceil(x / y), does not overflow for large `x`
#[inline]
pub(crate) const fn ceil_div(x: usize, y: usize) -> usize {
    x / y + (x % y != 0) as usize
}

/// Locks `mutex` and recovers the data if another thread panicked while holding it.
///
/// All state guarded by the simulator locks is updated in single steps, so a
/// poisoned lock still holds consistent data.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| {
        warn!("recovering poisoned lock");
        err.into_inner()
    })
}
