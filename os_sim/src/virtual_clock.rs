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

//! Shared tick counter that paces the whole simulation.
//!
//! All timing of the simulator (delay per instruction, idle polling of the
//! workers, batch spawning) is expressed in ticks of this clock instead of
//! wall time. One background thread advances the counter every
//! `tick_interval`; everybody else only reads it.

use core::fmt;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error};

use crate::util::lock_recover;

/// The tick counter wraps around at this value
pub const TICK_WRAP: u64 = 1 << 48;

/// Lower bound for the sleep between two polls inside of `delay`
const MIN_POLL_INTERVAL: Duration = Duration::from_micros(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// `start` was called while the ticker thread is running
    AlreadyTicking,

    /// The ticker thread could not be spawned
    SpawnFailed,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::AlreadyTicking => f.write_str("virtual clock is already ticking"),
            ClockError::SpawnFailed => f.write_str("could not spawn the ticker thread"),
        }
    }
}

struct ClockShared {
    ticks: AtomicU64,
    ticking: AtomicBool,
}

impl ClockShared {
    #[inline]
    fn tick(&self) -> u64 {
        // single writer in normal operation, but manual ticks from tests
        // may race with the ticker so use an atomic read-modify-write
        let prev = self
            .ticks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| Some((t + 1) % TICK_WRAP))
            .unwrap_or_default();
        (prev + 1) % TICK_WRAP
    }
}

pub struct VirtualClock {
    shared: Arc<ClockShared>,
    tick_interval: Duration,
    poll_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl VirtualClock {
    /// Creates a new clock at tick 0. The clock does not advance until `start` is called
    /// (or `tick` is called manually).
    pub fn new(tick_interval: Duration) -> Self {
        let poll_interval = (tick_interval / 8).max(MIN_POLL_INTERVAL).min(tick_interval);

        Self {
            shared: Arc::new(ClockShared {
                ticks: AtomicU64::new(0),
                ticking: AtomicBool::new(false),
            }),
            tick_interval,
            poll_interval,
            ticker: Mutex::new(None),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Spawns the background thread that advances the clock every `tick_interval`
    pub fn start(&self) -> Result<(), ClockError> {
        if self.shared.ticking.swap(true, Ordering::SeqCst) {
            return Err(ClockError::AlreadyTicking);
        }

        let shared = self.shared.clone();
        let interval = self.tick_interval;
        let handle = thread::Builder::new()
            .name("virtual-clock".into())
            .spawn(move || {
                while shared.ticking.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    shared.tick();
                }
            })
            .map_err(|err| {
                error!("could not spawn ticker thread: {}", err);
                self.shared.ticking.store(false, Ordering::SeqCst);
                ClockError::SpawnFailed
            })?;

        *lock_recover(&self.ticker) = Some(handle);
        debug!("virtual clock started with {:?} per tick", self.tick_interval);
        Ok(())
    }

    /// Stops the ticker thread and waits for it to exit. Does nothing if it is not running.
    pub fn stop(&self) {
        self.shared.ticking.store(false, Ordering::SeqCst);

        let handle = lock_recover(&self.ticker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("ticker thread panicked");
            }
            debug!("virtual clock stopped at tick {}", self.now());
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.shared.ticking.load(Ordering::Acquire)
    }

    /// Advances the clock by one tick and returns the new value
    pub fn tick(&self) -> u64 {
        self.shared.tick()
    }

    /// Current tick, never blocks
    #[inline]
    pub fn now(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Ticks that passed since `start_tick`, respecting the wrap around
    #[inline]
    pub fn elapsed_since(&self, start_tick: u64) -> u64 {
        (self.now() + TICK_WRAP - start_tick) % TICK_WRAP
    }

    /// Waits cooperatively until at least `ticks` ticks have passed.
    ///
    /// **Note**: This only returns if somebody advances the clock
    /// (ticker thread or manual `tick` calls).
    pub fn delay(&self, ticks: u64) {
        if ticks == 0 {
            return;
        }

        let start_tick = self.now();
        while self.elapsed_since(start_tick) < ticks {
            thread::yield_now();
            thread::sleep(self.poll_interval);
        }
    }
}

impl Drop for VirtualClock {
    fn drop(&mut self) {
        self.stop();
    }
}
