use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{OSSimConfig, OSSimulator, ProcessRequest};

mod errors;

const TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates an initialized simulator with a fast clock and a fixed seed
pub(crate) fn get_test_simulator(config: OSSimConfig) -> OSSimulator {
    init_test_logging();

    let simulator = OSSimulator::new();
    simulator
        .initialize(OSSimConfig {
            tick_interval: Duration::from_millis(1),
            rng_seed: Some(4_512_385_723_512_731),
            ..config
        })
        .unwrap();
    simulator
}

/// Request with exactly `instructions` instructions and `memory` bytes
pub(crate) fn fixed_request(name: &str, instructions: u64, memory: usize) -> ProcessRequest {
    ProcessRequest {
        name: name.into(),
        min_instructions: instructions,
        max_instructions: instructions,
        min_memory: memory,
        max_memory: memory,
    }
}

/// Waits until `count` processes are in the finished list.
/// Memory and burst history are up to date for all of them afterwards.
pub(crate) fn wait_for_finished(simulator: &OSSimulator, count: usize) {
    wait_until(|| {
        simulator
            .snapshot()
            .map(|snapshot| snapshot.finished.len() >= count)
            .unwrap_or(false)
    });
}

/// Polls `condition` until it holds, panics after a generous timeout
pub(crate) fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition did not hold in time");
        thread::sleep(Duration::from_millis(2));
    }
}
