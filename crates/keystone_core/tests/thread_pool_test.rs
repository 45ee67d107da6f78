//! Integration test for the worker pool and frame-loop style polling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use keystone_core::{Coordinator, EngineConfig, TaskHandle, ThreadPool, ThreadPoolError};

#[derive(Debug, Clone, PartialEq)]
struct Chunk {
    id: u32,
    voxels: Vec<u8>,
}

#[test]
fn test_ten_tasks_return_their_index() {
    let pool = ThreadPool::new(4);
    let handles: Vec<TaskHandle<usize>> =
        (0..10).map(|i| pool.enqueue(move || i).unwrap()).collect();

    for (expected, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait(), Ok(expected));
    }
}

#[test]
fn test_poll_results_into_coordinator() {
    let config = EngineConfig {
        arena_bytes: 1024 * 1024,
        max_entities: 64,
        worker_threads: Some(2),
        ..EngineConfig::default()
    };
    let coordinator = Coordinator::new(&config);
    coordinator.register_component::<Chunk>().unwrap();
    let pool = ThreadPool::from_config(&config);
    assert_eq!(pool.worker_count(), 2);

    let mut loading: Vec<TaskHandle<Chunk>> = (0..8u32)
        .map(|id| {
            pool.enqueue(move || {
                thread::sleep(Duration::from_millis(u64::from(id % 3)));
                Chunk {
                    id,
                    voxels: vec![1; 32],
                }
            })
            .unwrap()
        })
        .collect();

    // Frame loop: integrate whatever finished, never block.
    let mut frames = 0;
    while !loading.is_empty() {
        loading.retain_mut(|handle| match handle.try_take() {
            Some(chunk) => {
                let e = coordinator.create_entity().unwrap();
                coordinator.add_component(e, chunk.unwrap()).unwrap();
                false
            }
            None => true,
        });
        frames += 1;
        thread::sleep(Duration::from_micros(100));
    }

    assert!(frames >= 1);
    assert_eq!(coordinator.entities_with::<(Chunk,)>().unwrap().len(), 8);
}

#[test]
fn test_drop_drains_pending_work() {
    let done = Arc::new(AtomicUsize::new(0));
    {
        let pool = ThreadPool::new(1);
        for _ in 0..50 {
            let done = Arc::clone(&done);
            let _ = pool
                .enqueue(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
    }
    assert_eq!(done.load(Ordering::SeqCst), 50);
}

#[test]
fn test_worker_survives_panics() {
    let pool = ThreadPool::new(2);
    let results: Vec<_> = (0..6)
        .map(|i| {
            pool.enqueue(move || {
                assert!(i % 2 == 0, "odd task {i}");
                i
            })
            .unwrap()
        })
        .map(TaskHandle::wait)
        .collect();

    for (i, result) in results.into_iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(result, Ok(i));
        } else {
            assert_eq!(result, Err(ThreadPoolError::TaskPanicked));
        }
    }
    assert_eq!(pool.worker_count(), 2);
}
