use std::sync::Arc;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    modules::{
        allocator::{FlatAllocatorModule, PagingAllocatorModule},
        backing_store::{FileBackingStoreModule, MemoryBackingStoreModule},
    },
    process::{Process, ProcessId, ProcessState},
};

use super::{AdmissionError, MemoryManager};

fn test_process(id: u64, memory_bytes: usize) -> Arc<Process> {
    Arc::new(Process::new(
        ProcessId(id),
        format!("p{}", id),
        10,
        memory_bytes,
        0,
    ))
}

fn paging_manager(
    frame_size: usize,
    frame_count: usize,
) -> MemoryManager<PagingAllocatorModule, MemoryBackingStoreModule> {
    MemoryManager::new(
        PagingAllocatorModule::new(frame_size, frame_count),
        MemoryBackingStoreModule::new(),
    )
}

fn flat_manager(total: usize) -> MemoryManager<FlatAllocatorModule, MemoryBackingStoreModule> {
    MemoryManager::new(
        FlatAllocatorModule::new(total, 1),
        MemoryBackingStoreModule::new(),
    )
}

#[test]
fn test_admit_and_release() {
    let manager = paging_manager(256, 4);
    let p1 = test_process(1, 300);

    let admission = manager.admit(&p1).unwrap();
    assert!(admission.evicted.is_empty());
    assert!(!admission.already_resident);
    assert!(p1.is_memory_allocated());
    assert!(manager.is_resident(&p1));

    // two frames for 300 bytes
    let stats = manager.stats();
    assert_eq!(stats.used_bytes, 512);
    assert_eq!(stats.free_bytes, 512);
    assert_eq!(stats.resident_processes, 1);

    // admitting again only pins
    let admission = manager.admit(&p1).unwrap();
    assert!(admission.already_resident);
    assert_eq!(manager.stats().used_bytes, 512);

    assert!(manager.release(&p1));
    assert!(!p1.is_memory_allocated());
    assert!(!manager.is_resident(&p1));
    assert_eq!(manager.stats().free_bytes, 1024);
    assert_eq!(manager.check_integrity(), Ok(()));
}

#[test]
fn test_release_is_idempotent() {
    let manager = paging_manager(256, 4);
    let p1 = test_process(1, 256);
    let p2 = test_process(2, 256);

    manager.admit(&p1).unwrap();
    manager.admit(&p2).unwrap();

    assert!(manager.release(&p1));
    assert!(!manager.release(&p1));
    assert_eq!(manager.stats().free_bytes, 768);

    // never admitted
    assert!(!manager.release(&test_process(3, 256)));
    assert_eq!(manager.stats().free_bytes, 768);
    assert_eq!(manager.check_integrity(), Ok(()));
}

#[test]
fn test_evict_oldest() {
    let manager = paging_manager(256, 4);
    let processes: Vec<_> = (1..=4).map(|id| test_process(id, 256)).collect();

    for process in processes.iter() {
        manager.admit(process).unwrap();
        assert!(manager.unpin(process));
    }
    assert_eq!(manager.stats().free_bytes, 0);

    let p5 = test_process(5, 256);
    let admission = manager.admit(&p5).unwrap();

    // exactly the oldest one is evicted
    assert_eq!(admission.evicted, vec!["p1"]);
    assert_eq!(processes[0].state(), ProcessState::SwappedOut);
    assert!(!processes[0].is_memory_allocated());
    assert_eq!(manager.swapped_out(), vec!["p1"]);
    assert_eq!(manager.resident_names(), vec!["p2", "p3", "p4", "p5"]);
    assert_eq!(manager.stats().evictions, 1);

    // swapping in again evicts the next oldest and clears the ledger entry
    assert!(manager.unpin(&p5));
    let admission = manager.admit(&processes[0]).unwrap();
    assert_eq!(admission.evicted, vec!["p2"]);
    assert!(processes[0].is_memory_allocated());
    assert_eq!(manager.swapped_out(), vec!["p2"]);
    assert_eq!(manager.resident_names(), vec!["p3", "p4", "p5", "p1"]);
    assert_eq!(manager.stats().evictions, 2);
    assert_eq!(manager.check_integrity(), Ok(()));
}

#[test]
fn test_evict_multiple() {
    let manager = paging_manager(256, 4);
    let processes: Vec<_> = (1..=4).map(|id| test_process(id, 256)).collect();

    for process in processes.iter() {
        manager.admit(process).unwrap();
        manager.unpin(process);
    }

    let big = test_process(5, 600);
    let admission = manager.admit(&big).unwrap();
    assert_eq!(admission.evicted, vec!["p1", "p2", "p3"]);
    assert_eq!(manager.resident_names(), vec!["p4", "p5"]);
    assert_eq!(manager.check_integrity(), Ok(()));
}

#[test]
fn test_never_evict_pinned() {
    let manager = paging_manager(256, 4);
    let processes: Vec<_> = (1..=4).map(|id| test_process(id, 256)).collect();

    for process in processes.iter() {
        manager.admit(process).unwrap();
    }

    // only p2 is not running
    manager.unpin(&processes[1]);

    let p5 = test_process(5, 256);
    let admission = manager.admit(&p5).unwrap();
    assert_eq!(admission.evicted, vec!["p2"]);
    assert_eq!(processes[0].state(), ProcessState::Created);
    assert!(processes[0].is_memory_allocated());

    // everything is pinned now
    let p6 = test_process(6, 256);
    assert_eq!(manager.admit(&p6), Err(AdmissionError::InsufficientMemory));
    assert!(!p6.is_memory_allocated());
    assert_eq!(manager.stats().evictions, 1);
    for process in [&processes[0], &processes[2], &processes[3], &p5] {
        assert!(manager.is_resident(process));
    }
}

#[test]
fn test_no_pointless_eviction() {
    let manager = paging_manager(256, 4);
    let p1 = test_process(1, 256);
    let p2 = test_process(2, 512);

    manager.admit(&p1).unwrap();
    manager.admit(&p2).unwrap();
    manager.unpin(&p1);

    // 256 free + 256 evictable is not enough for 768 bytes
    let p3 = test_process(3, 768);
    assert_eq!(manager.admit(&p3), Err(AdmissionError::InsufficientMemory));
    assert!(manager.is_resident(&p1));
    assert_eq!(manager.stats().evictions, 0);
}

#[test]
fn test_exceeds_capacity() {
    let manager = paging_manager(256, 4);
    let p1 = test_process(1, 1025);

    assert!(!manager.can_ever_fit(1025));
    assert!(manager.can_ever_fit(1024));
    assert_eq!(manager.admit(&p1), Err(AdmissionError::ExceedsCapacity));
    assert_eq!(manager.stats().used_bytes, 0);
}

#[test]
fn test_flat_evict_and_retry() {
    let manager = flat_manager(1000);
    let a = test_process(1, 400);
    let b = test_process(2, 400);

    manager.admit(&a).unwrap();
    manager.admit(&b).unwrap();
    manager.unpin(&a);

    // 200 bytes free at the end, not enough for 300
    let c = test_process(3, 300);
    let admission = manager.admit(&c).unwrap();
    assert_eq!(admission.evicted, vec!["p1"]);
    assert_eq!(manager.resident_names(), vec!["p2", "p3"]);

    let stats = manager.stats();
    assert_eq!(stats.used_bytes, 700);
    // hole of 100 at [300, 400) and 200 at [800, 1000)
    assert_eq!(stats.external_fragmentation_bytes, 100);
    assert_eq!(manager.check_integrity(), Ok(()));
}

#[test]
fn test_flat_fragmentation_exhausts_candidates() {
    let manager = flat_manager(1000);
    let a = test_process(1, 300);
    let b = test_process(2, 300);
    let c = test_process(3, 300);

    manager.admit(&a).unwrap();
    manager.admit(&b).unwrap();
    manager.admit(&c).unwrap();
    manager.unpin(&a);
    manager.unpin(&c);

    // enough bytes in total, but b splits the memory in two holes
    let d = test_process(4, 500);
    assert_eq!(manager.admit(&d), Err(AdmissionError::InsufficientMemory));
    assert_eq!(manager.stats().evictions, 2);
    assert_eq!(manager.swapped_out(), vec!["p1", "p3"]);
    assert_eq!(manager.resident_names(), vec!["p2"]);
    assert_eq!(manager.stats().external_fragmentation_bytes, 300);
    assert_eq!(manager.check_integrity(), Ok(()));
}

#[test]
fn test_file_backing_store_ledger() {
    const PATH: &str = "/tmp/memory_manager_test_file_backing_store_ledger.tmp";
    let manager = MemoryManager::new(
        PagingAllocatorModule::new(256, 1),
        FileBackingStoreModule::new(PATH.into()).unwrap(),
    );

    let p1 = test_process(1, 256);
    let p2 = test_process(2, 256);

    manager.admit(&p1).unwrap();
    manager.unpin(&p1);
    manager.admit(&p2).unwrap();
    manager.unpin(&p2);
    assert_eq!(std::fs::read_to_string(PATH).unwrap(), "p1\n");

    manager.admit(&p1).unwrap();
    assert_eq!(std::fs::read_to_string(PATH).unwrap(), "p2\n");
}

/// random admit/unpin/release sequences should never break the capacity invariant
fn random_operations<A, B>(manager: MemoryManager<A, B>, max_demand: usize, seed: u64)
where
    A: crate::modules::allocator::MemoryAllocatorModule,
    B: crate::modules::backing_store::BackingStoreModule,
{
    const OPERATIONS: usize = 2000;

    let mut rand = SmallRng::seed_from_u64(seed);
    let mut processes: Vec<Arc<Process>> = Vec::new();
    let mut next_id = 1;
    let capacity = manager.stats().total_bytes;

    for _ in 0..OPERATIONS {
        match rand.gen_range(0..4) {
            0 | 1 => {
                let process = test_process(next_id, rand.gen_range(1..=max_demand));
                next_id += 1;
                if manager.admit(&process).is_ok() {
                    assert!(process.is_memory_allocated());
                }
                processes.push(process);
            }
            2 if !processes.is_empty() => {
                let index = rand.gen_range(0..processes.len());
                manager.unpin(&processes[index]);
            }
            3 if !processes.is_empty() => {
                let index = rand.gen_range(0..processes.len());
                let process = processes.swap_remove(index);
                let was_resident = manager.is_resident(&process);
                assert_eq!(manager.release(&process), was_resident);
            }
            _ => {}
        }

        let stats = manager.stats();
        assert!(stats.used_bytes <= capacity);
        assert_eq!(stats.used_bytes + stats.free_bytes, capacity);
        assert_eq!(manager.check_integrity(), Ok(()));

        let resident = manager.resident_names();
        for name in manager.swapped_out() {
            assert!(!resident.contains(&name), "{} is resident and swapped out", name);
        }
    }
}

#[test]
fn test_random_operations_paging() {
    random_operations(paging_manager(64, 16), 300, 8_234_589_123_481_234);
}

#[test]
fn test_random_operations_flat() {
    random_operations(flat_manager(1024), 300, 1_348_975_435_187_341);
}
