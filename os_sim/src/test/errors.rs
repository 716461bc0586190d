use std::time::Duration;

use crate::{
    ConfigError, InitError, OSSimConfig, OSSimulator, ProcessRequest, SpawnerError, SubmitError,
};

use super::{fixed_request, get_test_simulator, init_test_logging};

#[test]
fn test_not_initialized() {
    init_test_logging();
    let simulator = OSSimulator::new();

    assert!(!simulator.is_initialized());
    assert_eq!(
        simulator.create_process(fixed_request("a", 1, 1)).unwrap_err(),
        SubmitError::NotInitialized
    );
    assert_eq!(
        simulator.spawn_process("a").unwrap_err(),
        SubmitError::NotInitialized
    );
    assert_eq!(
        simulator.create_processes(vec![]).unwrap_err(),
        SubmitError::NotInitialized
    );
    assert_eq!(
        simulator.start_batch_spawner(),
        Err(SpawnerError::NotInitialized)
    );
    assert!(simulator.snapshot().is_none());
    assert!(simulator.memory_stats().is_none());
    assert!(simulator.processes().is_empty());
    assert!(simulator.process("a").is_none());

    // shutting down an uninitialized simulator does nothing
    simulator.shutdown();
}

#[test]
fn test_initialize_twice() {
    let simulator = get_test_simulator(OSSimConfig::default());
    assert!(simulator.is_initialized());
    assert_eq!(
        simulator.initialize(OSSimConfig::default()),
        Err(InitError::AlreadyInitialized)
    );

    simulator.shutdown();
    assert!(!simulator.is_initialized());

    // can be initialized again after a shutdown
    simulator
        .initialize(OSSimConfig {
            tick_interval: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap();
    assert!(simulator.processes().is_empty());
    simulator.shutdown();
}

#[test]
fn test_invalid_config() {
    init_test_logging();
    let simulator = OSSimulator::new();

    assert_eq!(
        simulator.initialize(OSSimConfig {
            num_cores: 0,
            ..Default::default()
        }),
        Err(InitError::InvalidConfig(ConfigError::NoCores))
    );
    assert!(!simulator.is_initialized());
}

#[test]
fn test_duplicate_name() {
    let simulator = get_test_simulator(OSSimConfig::default());

    let first = simulator.create_process(fixed_request("a", 3, 64)).unwrap();
    assert_eq!(
        simulator.create_process(fixed_request("a", 3, 64)).unwrap_err(),
        SubmitError::DuplicateName
    );
    assert_eq!(
        simulator.spawn_process("a").unwrap_err(),
        SubmitError::DuplicateName
    );

    // the existing process is untouched
    assert_eq!(simulator.process("a").unwrap().id(), first.id());
    assert_eq!(simulator.processes().len(), 1);

    simulator.shutdown();
}

#[test]
fn test_batch_is_atomic() {
    let simulator = get_test_simulator(OSSimConfig::default());
    simulator.create_process(fixed_request("a", 3, 64)).unwrap();

    // one duplicate refuses the whole batch
    assert_eq!(
        simulator
            .create_processes(vec![fixed_request("x", 3, 64), fixed_request("a", 3, 64)])
            .unwrap_err(),
        SubmitError::DuplicateName
    );
    assert!(simulator.process("x").is_none());

    // duplicates inside of the batch
    assert_eq!(
        simulator
            .create_processes(vec![fixed_request("y", 3, 64), fixed_request("y", 3, 64)])
            .unwrap_err(),
        SubmitError::DuplicateName
    );
    assert!(simulator.process("y").is_none());
    assert_eq!(simulator.processes().len(), 1);

    simulator.shutdown();
}

#[test]
fn test_exceeds_capacity() {
    let simulator = get_test_simulator(OSSimConfig {
        total_memory: 1024,
        frame_size: 256,
        ..Default::default()
    });

    assert_eq!(
        simulator
            .create_process(fixed_request("huge", 3, 2048))
            .unwrap_err(),
        SubmitError::ExceedsCapacity
    );
    assert!(simulator.process("huge").is_none());

    // must not wrap around when rounding up to whole frames
    assert_eq!(
        simulator
            .create_process(fixed_request("max", 3, usize::MAX))
            .unwrap_err(),
        SubmitError::ExceedsCapacity
    );
    assert_eq!(
        simulator
            .create_process(fixed_request("almost_max", 3, usize::MAX - 255))
            .unwrap_err(),
        SubmitError::ExceedsCapacity
    );
    assert!(simulator.processes().is_empty());

    // exactly the whole memory is fine
    simulator.create_process(fixed_request("whole", 3, 1024)).unwrap();

    simulator.shutdown();
}

#[test]
fn test_invalid_requests() {
    let simulator = get_test_simulator(OSSimConfig::default());

    for name in ["", "with space", "new\nline"] {
        assert_eq!(
            simulator.create_process(fixed_request(name, 3, 64)).unwrap_err(),
            SubmitError::InvalidName
        );
    }

    let inverted = ProcessRequest {
        name: "inverted".into(),
        min_instructions: 10,
        max_instructions: 5,
        min_memory: 64,
        max_memory: 64,
    };
    assert_eq!(
        simulator.create_process(inverted).unwrap_err(),
        SubmitError::InvalidRequest
    );
    assert_eq!(
        simulator
            .create_process(fixed_request("empty", 0, 64))
            .unwrap_err(),
        SubmitError::InvalidRequest
    );
    assert!(simulator.processes().is_empty());

    simulator.shutdown();
}
