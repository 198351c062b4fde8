//! Single-worker FIFO task runner for background cleanup.
//!
//! One background thread drains an unbounded queue in submission order. No
//! panic may escape the worker: tasks are run under `catch_unwind` and
//! failures are logged and swallowed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::warn;

/// A queued unit of background work.
type Task = Box<dyn FnOnce() + Send + 'static>;

enum Request {
    Run(Task),
    Shutdown,
}

/// Single-threaded FIFO executor.
///
/// Tasks run on exactly one worker thread, in submission order. Dropping the
/// runner stops the worker after the tasks already queued ahead of the
/// shutdown marker have run.
pub struct TaskRunner {
    tx: Sender<Request>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskRunner {
    /// Start the worker thread.
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Request>();
        let worker = thread::Builder::new()
            .name("oxicache-cleanup".to_string())
            .spawn(move || worker_loop(rx))
            .ok();
        if worker.is_none() {
            warn!("failed to spawn cleanup worker; background tasks will not run");
        }

        Self {
            tx,
            worker: Mutex::new(worker),
        }
    }

    /// Queue a task. Returns false if the worker has shut down.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Request::Run(Box::new(task))).is_ok()
    }

    /// Stop the worker and wait for it to finish.
    ///
    /// When called from the worker thread itself (a task can hold the last
    /// reference to the runner's owner), the join is skipped and the thread
    /// winds down detached after the current task.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = self.tx.send(Request::Shutdown);
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(rx: Receiver<Request>) {
    while let Ok(request) = rx.recv() {
        match request {
            Request::Run(task) => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    warn!("background task panicked");
                }
            }
            Request::Shutdown => break,
        }
    }
}
