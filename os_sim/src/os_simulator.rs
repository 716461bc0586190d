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
    collections::HashMap,
    io::ErrorKind,
    sync::{Arc, Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, info, warn};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    batch_spawner::{BatchSpawner, SpawnerError},
    memory_manager::MemoryManager,
    modules::{allocator::allocator_from_config, backing_store::backing_store_from_config},
    os_sim_config::{ConfigError, OSSimConfig},
    process::{Process, ProcessId},
    report::{BurstRecord, MemoryStats, ProcessSnapshot, SystemSnapshot},
    scheduler::Scheduler,
    util::lock_recover,
    virtual_clock::{ClockError, VirtualClock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    AlreadyInitialized,
    InvalidConfig(ConfigError),
    BackingStore(ErrorKind),
    Clock(ClockError),
    Workers(ErrorKind),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::AlreadyInitialized => f.write_str("simulator is already initialized"),
            InitError::InvalidConfig(err) => write!(f, "invalid config: {}", err),
            InitError::BackingStore(kind) => write!(f, "could not open backing store: {}", kind),
            InitError::Clock(err) => write!(f, "{}", err),
            InitError::Workers(kind) => write!(f, "could not start workers: {}", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    NotInitialized,
    DuplicateName,
    ExceedsCapacity,

    /// Names have to be non empty and must not contain whitespace
    InvalidName,

    /// Empty or inverted instruction or memory range
    InvalidRequest,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SubmitError::NotInitialized => "simulator is not initialized",
            SubmitError::DuplicateName => "a process with this name already exists",
            SubmitError::ExceedsCapacity => "memory demand exceeds total memory",
            SubmitError::InvalidName => "invalid process name",
            SubmitError::InvalidRequest => "invalid instruction or memory range",
        };
        f.write_str(text)
    }
}

/// Parameters of a new process. Instruction count and memory demand are drawn
/// uniformly from the given inclusive ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub name: String,
    pub min_instructions: u64,
    pub max_instructions: u64,
    pub min_memory: usize,
    pub max_memory: usize,
}

impl ProcessRequest {
    /// Request that uses the ranges of `config`
    pub fn from_config(name: String, config: &OSSimConfig) -> Self {
        Self {
            name,
            min_instructions: config.min_instructions,
            max_instructions: config.max_instructions,
            min_memory: config.min_memory,
            max_memory: config.max_memory,
        }
    }

    fn validate(&self) -> Result<(), SubmitError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(SubmitError::InvalidName);
        }
        if self.min_instructions == 0
            || self.min_instructions > self.max_instructions
            || self.min_memory > self.max_memory
        {
            return Err(SubmitError::InvalidRequest);
        }
        Ok(())
    }
}

struct ProcessRegistry {
    by_name: HashMap<String, Arc<Process>>,

    /// Creation order
    processes: Vec<Arc<Process>>,
    next_id: u64,
    rand: SmallRng,
}

/// Everything that exists between `initialize` and `shutdown`
struct SimSystem {
    config: OSSimConfig,
    clock: Arc<VirtualClock>,
    memory: Arc<MemoryManager>,
    scheduler: Scheduler,
    registry: Mutex<ProcessRegistry>,
}

impl SimSystem {
    fn new(config: OSSimConfig) -> Result<Self, InitError> {
        config.validate().map_err(InitError::InvalidConfig)?;

        let backing_store =
            backing_store_from_config(&config).map_err(|err| InitError::BackingStore(err.kind()))?;
        let memory = Arc::new(MemoryManager::new(
            allocator_from_config(&config),
            backing_store,
        ));

        let clock = Arc::new(VirtualClock::new(config.tick_interval));
        let scheduler = Scheduler::new(&config, clock.clone(), memory.clone());

        let seed = config.rng_seed.unwrap_or_else(seed_from_time);
        debug!("random seed: {}", seed);

        Ok(Self {
            clock,
            memory,
            scheduler,
            registry: Mutex::new(ProcessRegistry {
                by_name: HashMap::new(),
                processes: Vec::new(),
                next_id: 1,
                rand: SmallRng::seed_from_u64(seed),
            }),
            config,
        })
    }

    fn start(&self) -> Result<(), InitError> {
        self.clock.start().map_err(InitError::Clock)?;

        if let Err(err) = self.scheduler.start() {
            self.clock.stop();
            return Err(InitError::Workers(err.kind()));
        }
        Ok(())
    }

    fn registry(&self) -> MutexGuard<'_, ProcessRegistry> {
        lock_recover(&self.registry)
    }

    /// Creates all processes and submits them at once, or none of them
    fn create_processes(
        &self,
        requests: Vec<ProcessRequest>,
    ) -> Result<Vec<Arc<Process>>, SubmitError> {
        let mut registry = self.registry();

        for (i, request) in requests.iter().enumerate() {
            request.validate()?;

            let taken = registry.by_name.contains_key(&request.name)
                || requests[..i].iter().any(|other| other.name == request.name);
            if taken {
                return Err(SubmitError::DuplicateName);
            }
        }

        let mut drawn = Vec::with_capacity(requests.len());
        for request in requests {
            let instructions = registry
                .rand
                .gen_range(request.min_instructions..=request.max_instructions);
            let memory_bytes = registry
                .rand
                .gen_range(request.min_memory..=request.max_memory);

            if !self.memory.can_ever_fit(memory_bytes) {
                warn!(
                    "refused {}: {} bytes do not fit into memory",
                    request.name, memory_bytes
                );
                return Err(SubmitError::ExceedsCapacity);
            }
            drawn.push((request.name, instructions, memory_bytes));
        }

        let created_tick = self.clock.now();
        let mut processes = Vec::with_capacity(drawn.len());
        for (name, instructions, memory_bytes) in drawn {
            let id = ProcessId(registry.next_id);
            registry.next_id += 1;

            let process = Arc::new(Process::new(
                id,
                name.clone(),
                instructions,
                memory_bytes,
                created_tick,
            ));
            registry.by_name.insert(name, process.clone());
            registry.processes.push(process.clone());

            debug!(
                "created {} ({}) with {} instructions and {} bytes",
                process.name(),
                id,
                instructions,
                memory_bytes
            );
            processes.push(process);
        }

        // submit while still holding the registry lock, so queue order equals creation order
        self.scheduler.submit_all(processes.iter().cloned());
        Ok(processes)
    }

    fn shutdown(&self) {
        self.scheduler.shutdown();
        self.clock.stop();
    }
}

fn seed_from_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Entry point of the simulator.
///
/// Nothing can be scheduled until `initialize` was called with a valid config.
/// After `shutdown`, the simulator can be initialized again.
pub struct OSSimulator {
    system: Mutex<Option<Arc<SimSystem>>>,
    spawner: BatchSpawner,
}

impl OSSimulator {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(None),
            spawner: BatchSpawner::new(),
        }
    }

    fn system(&self) -> Option<Arc<SimSystem>> {
        lock_recover(&self.system).clone()
    }

    pub fn is_initialized(&self) -> bool {
        lock_recover(&self.system).is_some()
    }

    /// Starts the virtual clock and one worker per core
    pub fn initialize(&self, config: OSSimConfig) -> Result<(), InitError> {
        let mut system = lock_recover(&self.system);
        if system.is_some() {
            return Err(InitError::AlreadyInitialized);
        }

        let new_system = SimSystem::new(config)?;
        new_system.start()?;

        info!(
            "simulator initialized: {} cores, {:?}, {} bytes of memory ({:?})",
            new_system.config.num_cores,
            new_system.config.policy,
            new_system.config.total_memory,
            new_system.config.memory_mode()
        );
        *system = Some(Arc::new(new_system));
        Ok(())
    }

    /// Configuration the simulator was initialized with
    pub fn config(&self) -> Option<OSSimConfig> {
        self.system().map(|system| system.config.clone())
    }

    /// Creates a new process and appends it to the ready queue
    pub fn create_process(&self, request: ProcessRequest) -> Result<Arc<Process>, SubmitError> {
        let mut processes = self.create_processes(vec![request])?;
        processes.pop().ok_or(SubmitError::InvalidRequest)
    }

    /// Creates all processes and appends them to the ready queue in one step.
    ///
    /// If one request is refused, no process is created.
    pub fn create_processes(
        &self,
        requests: Vec<ProcessRequest>,
    ) -> Result<Vec<Arc<Process>>, SubmitError> {
        let system = self.system().ok_or(SubmitError::NotInitialized)?;
        system.create_processes(requests)
    }

    /// Creates a process named `name` with the configured ranges
    pub fn spawn_process(&self, name: &str) -> Result<Arc<Process>, SubmitError> {
        let system = self.system().ok_or(SubmitError::NotInitialized)?;
        let request = ProcessRequest::from_config(name.to_string(), &system.config);
        let mut processes = system.create_processes(vec![request])?;
        processes.pop().ok_or(SubmitError::InvalidRequest)
    }

    pub fn process(&self, name: &str) -> Option<Arc<Process>> {
        let system = self.system()?;
        let registry = system.registry();
        registry.by_name.get(name).cloned()
    }

    /// All processes ever created, in creation order
    pub fn processes(&self) -> Vec<ProcessSnapshot> {
        let system = match self.system() {
            Some(system) => system,
            None => return Vec::new(),
        };

        let registry = system.registry();
        registry.processes.iter().map(|p| p.snapshot()).collect()
    }

    /// Creates a process named `p<N>` every `batch_spawn_interval` ticks
    pub fn start_batch_spawner(&self) -> Result<(), SpawnerError> {
        let system = self.system().ok_or(SpawnerError::NotInitialized)?;
        let clock = system.clock.clone();
        let interval = system.config.batch_spawn_interval;

        let mut counter: u64 = 0;
        self.spawner.start(clock, interval, move || loop {
            counter += 1;
            let name = format!("p{}", counter);
            let request = ProcessRequest::from_config(name, &system.config);

            match system.create_processes(vec![request]) {
                Ok(_) => break,
                Err(SubmitError::DuplicateName) => continue,
                Err(err) => {
                    warn!("batch spawner could not create p{}: {}", counter, err);
                    break;
                }
            }
        })
    }

    /// Returns `false` if the batch spawner was not running
    pub fn stop_batch_spawner(&self) -> bool {
        self.spawner.stop()
    }

    pub fn is_batch_spawner_running(&self) -> bool {
        self.spawner.is_running()
    }

    pub fn snapshot(&self) -> Option<SystemSnapshot> {
        self.system().map(|system| system.scheduler.snapshot())
    }

    pub fn memory_stats(&self) -> Option<MemoryStats> {
        self.system().map(|system| system.memory.stats())
    }

    pub fn burst_history(&self) -> Vec<BurstRecord> {
        self.system()
            .map(|system| system.scheduler.burst_history())
            .unwrap_or_default()
    }

    /// Stops the batch spawner, the workers and then the clock.
    ///
    /// Workers finish their current burst first.
    pub fn shutdown(&self) {
        self.spawner.stop();

        let system = lock_recover(&self.system).take();
        if let Some(system) = system {
            system.shutdown();
            info!("simulator shut down at tick {}", system.clock.now());
        }
    }
}

impl Default for OSSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OSSimulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
