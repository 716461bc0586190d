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
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use log::{debug, error};

use crate::{util::lock_recover, virtual_clock::VirtualClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnerError {
    NotInitialized,
    AlreadyRunning,
    SpawnFailed,
}

impl fmt::Display for SpawnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnerError::NotInitialized => f.write_str("simulator is not initialized"),
            SpawnerError::AlreadyRunning => f.write_str("batch spawner is already running"),
            SpawnerError::SpawnFailed => f.write_str("could not spawn the batch spawner thread"),
        }
    }
}

/// Background thread that calls a spawn function every few ticks
pub struct BatchSpawner {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchSpawner {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Calls `spawn` every `interval` ticks of `clock` until `stop` is called
    pub fn start<F: FnMut() + Send + 'static>(
        &self,
        clock: Arc<VirtualClock>,
        interval: u64,
        mut spawn: F,
    ) -> Result<(), SpawnerError> {
        let mut handle = lock_recover(&self.handle);
        if handle.is_some() {
            return Err(SpawnerError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let interval = interval.max(1);
        let res = thread::Builder::new()
            .name("batch-spawner".into())
            .spawn(move || {
                'outer: while running.load(Ordering::Acquire) {
                    for _ in 0..interval {
                        if !running.load(Ordering::Acquire) {
                            break 'outer;
                        }
                        clock.delay(1);
                    }
                    spawn();
                }
            });

        match res {
            Ok(join_handle) => {
                *handle = Some(join_handle);
                debug!("batch spawner started, one process every {} ticks", interval);
                Ok(())
            }
            Err(err) => {
                error!("could not spawn batch spawner: {}", err);
                self.running.store(false, Ordering::SeqCst);
                Err(SpawnerError::SpawnFailed)
            }
        }
    }

    /// Stops the spawner thread and waits for it. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);

        let handle = lock_recover(&self.handle).take();
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    error!("batch spawner thread panicked");
                }
                debug!("batch spawner stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        lock_recover(&self.handle).is_some()
    }
}

impl Default for BatchSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchSpawner {
    fn drop(&mut self) {
        self.stop();
    }
}
