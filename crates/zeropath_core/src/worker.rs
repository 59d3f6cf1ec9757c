//! # Background Task Worker
//!
//! One long-lived thread draining a FIFO queue of boxed tasks.
//!
//! ```text
//!   Render thread ──enqueue──> [crossbeam channel] ──> [Worker thread]
//!        ▲                                                   │
//!        └────────── TaskHandle (bounded(1) result) <────────┘
//! ```
//!
//! The render thread never blocks on a handle: it polls with
//! [`TaskHandle::poll`] once per frame. Shutdown is a `Stop` message queued
//! behind all pending tasks, so everything enqueued before it still runs.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Progress of an enqueued task as seen from its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Still queued or running.
    Pending,
    /// Finished; the result can be taken.
    Ready,
    /// Panicked, or the worker went away before running it.
    Failed,
}

/// Counters maintained by the worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStats {
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Single background worker thread with a FIFO task queue.
pub struct TaskWorker {
    sender: Sender<Message>,
    thread: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl TaskWorker {
    /// Spawns the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);

        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || Self::run(&receiver, &thread_counters))?;

        tracing::debug!(worker = name, "task worker started");

        Ok(Self {
            sender,
            thread: Some(thread),
            counters,
        })
    }

    fn run(receiver: &Receiver<Message>, counters: &Counters) {
        for message in receiver {
            match message {
                Message::Run(job) => {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_ok() {
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        counters.panicked.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("worker task panicked; its handle reports failure");
                    }
                }
                Message::Stop => break,
            }
        }
    }

    /// Queues `task` and returns a handle to its result.
    ///
    /// Tasks run in submission order. If the worker has already stopped, the
    /// handle reports [`TaskState::Failed`].
    pub fn enqueue<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            // The handle may have been dropped; the result is simply discarded.
            let _ = result_tx.send(task());
        });

        if self.sender.send(Message::Run(job)).is_err() {
            tracing::warn!("enqueue after worker shutdown");
        }

        TaskHandle {
            receiver: result_rx,
            result: None,
            failed: false,
        }
    }

    /// Number of tasks waiting in the queue.
    #[inline]
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    /// Snapshot of the worker counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Lets queued tasks drain, then joins the thread. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.sender.send(Message::Stop);
        if thread.join().is_err() {
            tracing::warn!("task worker thread terminated abnormally");
        }
        tracing::debug!("task worker stopped");
    }
}

impl Drop for TaskWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Future-like handle to the result of one enqueued task.
pub struct TaskHandle<R> {
    receiver: Receiver<R>,
    result: Option<R>,
    failed: bool,
}

impl<R> TaskHandle<R> {
    /// Checks for completion without blocking.
    pub fn poll(&mut self) -> TaskState {
        if self.result.is_some() {
            return TaskState::Ready;
        }
        if self.failed {
            return TaskState::Failed;
        }
        match self.receiver.try_recv() {
            Ok(value) => {
                self.result = Some(value);
                TaskState::Ready
            }
            Err(TryRecvError::Empty) => TaskState::Pending,
            Err(TryRecvError::Disconnected) => {
                self.failed = true;
                TaskState::Failed
            }
        }
    }

    /// Returns `true` once the task has finished, successfully or not.
    pub fn is_finished(&mut self) -> bool {
        self.poll() != TaskState::Pending
    }

    /// Takes the result if the task is done. Never blocks.
    pub fn try_take(&mut self) -> Option<R> {
        self.poll();
        self.result.take()
    }

    /// Blocks until the task finishes. Returns `None` if it failed.
    ///
    /// Only for shutdown paths and tests; the render loop must use
    /// [`TaskHandle::poll`].
    #[must_use]
    pub fn wait(mut self) -> Option<R> {
        if let Some(value) = self.result.take() {
            return Some(value);
        }
        if self.failed {
            return None;
        }
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[test]
    fn test_enqueue_returns_result() {
        let worker = TaskWorker::spawn("test-worker").unwrap();
        let handle = worker.enqueue(|| 2 + 2);
        assert_eq!(handle.wait(), Some(4));
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let worker = TaskWorker::spawn("test-order").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let log = Arc::clone(&log);
                worker.enqueue(move || log.lock().push(i))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.wait(), Some(()));
        }
        assert_eq!(*log.lock(), (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_poll_does_not_block() {
        let worker = TaskWorker::spawn("test-poll").unwrap();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let mut handle = worker.enqueue(move || {
            let _ = release_rx.recv();
            7
        });

        assert_eq!(handle.poll(), TaskState::Pending);
        assert!(handle.try_take().is_none());

        release_tx.send(()).unwrap();
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.try_take(), Some(7));
    }

    #[test]
    fn test_panicking_task_reports_failure() {
        let worker = TaskWorker::spawn("test-panic").unwrap();
        let mut handle = worker.enqueue(|| -> u32 { panic!("boom") });
        while handle.poll() == TaskState::Pending {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.poll(), TaskState::Failed);

        // The worker survives and keeps serving.
        assert_eq!(worker.enqueue(|| 1).wait(), Some(1));
        assert_eq!(worker.stats().panicked, 1);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let mut worker = TaskWorker::spawn("test-drain").unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            let _ = worker.enqueue(move || counter.fetch_add(1, Ordering::Relaxed));
        }
        worker.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 100);

        let late = worker.enqueue(|| 5);
        assert_eq!(late.wait(), None);
    }
}
