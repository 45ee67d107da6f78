//! # Thread Pool
//!
//! Fixed set of worker threads pulling closures from one shared FIFO queue.
//!
//! ```text
//!   enqueue ──┐
//!   enqueue ──┼──> [Mutex<VecDeque<Job>> + Condvar] ──> worker 0..N ──> TaskHandle
//!   enqueue ──┘
//! ```
//!
//! Results travel back through a one-slot channel per task, so the frame
//! loop can poll with [`TaskHandle::try_take`] without blocking. Shutdown
//! stops accepting new work, lets the workers drain what is already queued,
//! then joins them.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::{Condvar, Mutex};

use crate::config::EngineConfig;
use crate::error::ThreadPoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    stopping: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
}

/// Pending result of a task submitted to a [`ThreadPool`].
///
/// Dropping the handle does not cancel the task; its result is discarded.
#[derive(Debug)]
pub struct TaskHandle<R> {
    receiver: Receiver<Result<R, ThreadPoolError>>,
    taken: bool,
}

impl<R> TaskHandle<R> {
    /// Returns `true` once the result is ready and has not been taken.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.taken && !self.receiver.is_empty()
    }

    /// Takes the result if the task has completed, without blocking.
    ///
    /// Returns `None` while the task is queued or running, and after the
    /// result has already been taken.
    pub fn try_take(&mut self) -> Option<Result<R, ThreadPoolError>> {
        if self.taken {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ThreadPoolError::TaskAbandoned),
        };
        self.taken = true;
        Some(outcome)
    }

    /// Blocks until the task completes and returns its result.
    ///
    /// # Errors
    ///
    /// - [`ThreadPoolError::TaskPanicked`] if the task panicked.
    /// - [`ThreadPoolError::TaskAbandoned`] if the task was dropped unrun or
    ///   its result was already taken.
    pub fn wait(self) -> Result<R, ThreadPoolError> {
        if self.taken {
            return Err(ThreadPoolError::TaskAbandoned);
        }
        self.receiver
            .recv()
            .unwrap_or(Err(ThreadPoolError::TaskAbandoned))
    }
}

/// Fixed-size worker pool.
///
/// Dropping the pool shuts it down (see [`ThreadPool::shutdown`]).
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `workers` threads (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                stopping: false,
            }),
            available: Condvar::new(),
        });

        let count = workers.max(1);
        let workers = (0..count)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || Self::worker_loop(&shared))
            })
            .collect();

        tracing::info!(workers = count, "thread pool started");
        Self { shared, workers }
    }

    /// Spawns the number of workers the configuration resolves to.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.resolved_worker_threads())
    }

    /// Number of live worker threads (zero after shutdown).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of queued tasks no worker has picked up yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    /// Queues `task` for execution on some worker.
    ///
    /// A panic inside `task` is caught on the worker and reported through
    /// the handle as [`ThreadPoolError::TaskPanicked`]; the worker survives.
    ///
    /// # Errors
    ///
    /// [`ThreadPoolError::ShutDown`] once shutdown has begun.
    pub fn enqueue<F, R>(&self, task: F) -> Result<TaskHandle<R>, ThreadPoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).map_err(|_| {
                tracing::warn!("pooled task panicked");
                ThreadPoolError::TaskPanicked
            });
            // Receiver may be gone; the result is simply discarded.
            let _ = sender.send(outcome);
        });

        {
            let mut state = self.shared.state.lock();
            if state.stopping {
                return Err(ThreadPoolError::ShutDown);
            }
            state.jobs.push_back(job);
        }
        self.shared.available.notify_one();

        Ok(TaskHandle {
            receiver,
            taken: false,
        })
    }

    /// Stops accepting tasks, runs everything already queued, then joins
    /// the workers. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if state.stopping && self.workers.is_empty() {
                return;
            }
            state.stopping = true;
        }
        self.shared.available.notify_all();

        let count = self.workers.len();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("worker thread terminated abnormally");
            }
        }
        tracing::info!(workers = count, "thread pool stopped");
    }

    fn worker_loop(shared: &Shared) {
        loop {
            let job = {
                let mut state = shared.state.lock();
                loop {
                    if let Some(job) = state.jobs.pop_front() {
                        break job;
                    }
                    if state.stopping {
                        return;
                    }
                    shared.available.wait(&mut state);
                }
            };
            job();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("pending", &self.pending())
            .finish()
    }
}
