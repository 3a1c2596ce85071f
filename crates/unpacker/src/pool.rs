//! Bounded worker pool with scoped lifetime.
//!
//! A pool only exists inside [`WorkerPool::scope`]. Tasks may borrow from the
//! caller's stack, submission never blocks, and leaving the scope (normally or
//! by unwinding) waits for every submitted task to finish.

use crate::error::ExtractError;
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

type Job<'env> = Box<dyn FnOnce() + Send + 'env>;

/// Result of one submitted task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The task returned a value.
    Succeeded {
        /// Task identifier given at submission
        id: String,
        /// Value returned by the task
        value: T,
    },
    /// The task returned an error or panicked.
    Failed {
        /// Task identifier given at submission
        id: String,
        /// Failure cause
        error: ExtractError,
    },
}

impl<T> TaskOutcome<T> {
    /// Identifier given at submission.
    pub fn id(&self) -> &str {
        match self {
            TaskOutcome::Succeeded { id, .. } | TaskOutcome::Failed { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }
}

/// Receiving side of a submitted task's outcome.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: String,
    receiver: mpsc::Receiver<TaskOutcome<T>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Blocks until the task has run and returns its outcome.
    pub fn wait(self) -> TaskOutcome<T> {
        match self.receiver.recv() {
            Ok(outcome) => outcome,
            Err(_) => TaskOutcome::Failed {
                error: ExtractError::TaskPanicked(format!("task {} was dropped unrun", self.id)),
                id: self.id,
            },
        }
    }
}

/// Handle to a running pool, valid for the duration of a [`WorkerPool::scope`] call.
pub struct WorkerPool<'env> {
    sender: mpsc::Sender<Job<'env>>,
    in_flight: Arc<AtomicUsize>,
    max_workers: usize,
    inline: bool,
}

impl<'env> WorkerPool<'env> {
    /// Runs `f` with a pool of up to `max_workers` threads (at least one).
    ///
    /// Returns once `f` has returned and every task it submitted has
    /// completed. If no worker thread can be started, tasks run on the
    /// submitting thread instead.
    pub fn scope<F, R>(max_workers: usize, f: F) -> R
    where
        F: FnOnce(&WorkerPool<'env>) -> R,
    {
        Self::scope_with_spawner(max_workers, spawn_thread, f)
    }

    fn scope_with_spawner<F, R, W>(max_workers: usize, spawn: W, f: F) -> R
    where
        F: FnOnce(&WorkerPool<'env>) -> R,
        W: for<'scope, 'any> Fn(
            &'scope thread::Scope<'scope, 'any>,
            String,
            Job<'scope>,
        ) -> io::Result<()>,
    {
        let max_workers = max_workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job<'env>>();
        let receiver = Mutex::new(receiver);

        thread::scope(|s| {
            let mut started = 0;
            for index in 0..max_workers {
                let receiver = &receiver;
                let worker: Job<'_> = Box::new(move || loop {
                    let job = receiver.lock().recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                });
                match spawn(s, format!("unpack-worker-{}", index), worker) {
                    Ok(()) => started += 1,
                    Err(e) => tracing::warn!("could not start worker {}: {}", index, e),
                }
            }
            if started == 0 {
                tracing::warn!("no worker thread started, running tasks inline");
            }

            // The pool owns the only sender: dropping it at the end of this
            // closure lets workers drain the queue and exit before the scope joins.
            let pool = WorkerPool {
                sender,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_workers,
                inline: started == 0,
            };
            f(&pool)
        })
    }

    /// Number of worker slots.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of tasks currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queues `task` and returns a handle to its outcome.
    ///
    /// `on_complete` runs exactly once on the thread that ran the task, with
    /// the task's outcome, before the outcome is made available to the handle.
    pub fn submit<T, F, C>(&self, id: impl Into<String>, task: F, on_complete: C) -> TaskHandle<T>
    where
        T: Send + 'env,
        F: FnOnce() -> Result<T, ExtractError> + Send + 'env,
        C: FnOnce(&TaskOutcome<T>) + Send + 'env,
    {
        let id = id.into();
        let (outcome_tx, outcome_rx) = mpsc::sync_channel(1);
        let in_flight = Arc::clone(&self.in_flight);
        let task_id = id.clone();

        let job: Job<'env> = Box::new(move || {
            in_flight.fetch_add(1, Ordering::SeqCst);
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(value)) => TaskOutcome::Succeeded { id: task_id, value },
                Ok(Err(error)) => TaskOutcome::Failed { id: task_id, error },
                Err(payload) => TaskOutcome::Failed {
                    id: task_id,
                    error: ExtractError::TaskPanicked(panic_message(payload.as_ref())),
                },
            };
            in_flight.fetch_sub(1, Ordering::SeqCst);

            if panic::catch_unwind(AssertUnwindSafe(|| on_complete(&outcome))).is_err() {
                tracing::error!("completion callback for {} panicked", outcome.id());
            }
            // The handle may already be gone.
            let _ = outcome_tx.send(outcome);
        });

        if self.inline {
            job();
        } else if let Err(mpsc::SendError(job)) = self.sender.send(job) {
            // The receiver outlives the pool; kept so a job is never dropped.
            job();
        }

        TaskHandle {
            id,
            receiver: outcome_rx,
        }
    }
}

fn spawn_thread<'scope, 'any>(
    s: &'scope thread::Scope<'scope, 'any>,
    name: String,
    work: Job<'scope>,
) -> io::Result<()> {
    thread::Builder::new().name(name).spawn_scoped(s, work)?;
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
