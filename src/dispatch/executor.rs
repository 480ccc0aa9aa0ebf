use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

/// A unit of work for the UI-affine thread.
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks on the thread that owns camera, surface and view state.
///
/// Tasks posted from one thread run in posting order. Posting never blocks
/// and gives no completion signal; callers that need one carry it inside
/// the task.
pub trait UiDispatcher: Send + Sync {
    fn post(&self, task: Task);
}

/// Dispatcher backed by one dedicated, named thread.
pub struct ThreadDispatcher {
    tx: Mutex<Option<UnboundedSender<Task>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadDispatcher {
    /// Spawn the dispatcher thread.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = unbounded_channel::<Task>();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!("ui task panicked; dispatcher keeps running");
                    }
                }
                tracing::debug!("ui dispatcher exiting");
            })?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop accepting tasks, drain the ones already posted and join the
    /// thread. Idempotent.
    pub fn shutdown(&self) {
        self.tx.lock().take();
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                // Called from a task; the loop ends once this task returns
                return;
            }
            let _ = handle.join();
        }
    }
}

impl UiDispatcher for ThreadDispatcher {
    fn post(&self, task: Task) {
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) => {
                if tx.send(task).is_err() {
                    tracing::warn!("ui dispatcher thread is gone, dropping task");
                }
            }
            None => tracing::warn!("ui dispatcher is shut down, dropping task"),
        }
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs every task immediately on the posting thread.
///
/// For hosts that already call in from their UI thread, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn post(&self, task: Task) {
        task();
    }
}
