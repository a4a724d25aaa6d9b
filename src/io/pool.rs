//! Shared worker pool and deferred results
//!
//! The pool is a multi-thread Tokio runtime owned by the client. It runs the
//! transport loops, every asynchronous operation wrapper, and every listener
//! dispatch. A [`Deferred`] is the handle returned by the non-blocking form
//! of an operation: `.await` it from async code, or [`Deferred::wait`] on it
//! from a plain thread.

use crate::error::{GazeError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Lazily started Tokio runtime shared by one client
pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    threads: usize,
}

impl WorkerPool {
    /// Create a pool sized to the available parallelism
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .max(2);
        Self::with_threads(threads)
    }

    pub fn with_threads(threads: usize) -> Self {
        WorkerPool {
            runtime: Mutex::new(None),
            threads: threads.max(1),
        }
    }

    /// Handle to the running pool, starting it if needed
    pub fn handle(&self) -> Result<Handle> {
        let mut runtime = self.runtime.lock();
        if let Some(rt) = runtime.as_ref() {
            return Ok(rt.handle().clone());
        }

        let rt = Builder::new_multi_thread()
            .worker_threads(self.threads)
            .thread_name("gazelink-worker")
            .enable_all()
            .build()
            .map_err(|e| GazeError::Runtime(e.to_string()))?;
        info!(threads = self.threads, "Worker pool started");

        let handle = rt.handle().clone();
        *runtime = Some(rt);
        Ok(handle)
    }

    /// Run `future` on the pool
    pub fn spawn<F>(&self, future: F) -> Result<Deferred<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = self.handle()?;
        let task = handle.spawn(future);
        Ok(Deferred::from_task(task, handle))
    }

    /// Stop the pool without waiting for in-flight tasks
    ///
    /// A later [`handle`](Self::handle) call starts a fresh runtime.
    pub fn shutdown(&self) {
        if let Some(rt) = self.runtime.lock().take() {
            rt.shutdown_background();
            debug!("Worker pool shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping a Runtime inside an async context panics; shutdown_background does not.
        self.shutdown();
    }
}

enum DeferredState<T> {
    Task { task: JoinHandle<T>, handle: Handle },
    Ready(Option<T>),
}

/// Result of an operation running on the worker pool
///
/// Resolves to `None` if the task was cancelled (pool shut down) or
/// panicked.
pub struct Deferred<T> {
    state: DeferredState<T>,
}

impl<T: Send + 'static> Deferred<T> {
    fn from_task(task: JoinHandle<T>, handle: Handle) -> Self {
        Deferred {
            state: DeferredState::Task { task, handle },
        }
    }

    /// A deferred that is already resolved
    pub fn ready(value: T) -> Self {
        Deferred {
            state: DeferredState::Ready(Some(value)),
        }
    }

    /// A deferred that resolves to `None`
    pub fn failed() -> Self {
        Deferred {
            state: DeferredState::Ready(None),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            DeferredState::Task { task, .. } => task.is_finished(),
            DeferredState::Ready(_) => true,
        }
    }

    /// Block the current thread until the result is available or `timeout` passes
    ///
    /// On timeout the operation keeps running in the background and its
    /// result is discarded.
    pub fn wait(self, timeout: Duration) -> Option<T> {
        let (task, handle) = match self.state {
            DeferredState::Ready(value) => return value,
            DeferredState::Task { task, handle } => (task, handle),
        };

        let block = move || {
            handle.block_on(async move {
                match tokio::time::timeout(timeout, task).await {
                    Ok(joined) => joined.ok(),
                    Err(_) => None,
                }
            })
        };

        if Handle::try_current().is_ok() {
            // Called from inside a runtime: blocking here directly would panic.
            std::thread::scope(|scope| scope.spawn(block).join().ok().flatten())
        } else {
            block()
        }
    }
}

// The output value is never pinned in place.
impl<T> Unpin for Deferred<T> {}

impl<T> Future for Deferred<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            DeferredState::Ready(value) => Poll::Ready(value.take()),
            DeferredState::Task { task, .. } => Pin::new(task).poll(cx).map(|joined| joined.ok()),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            DeferredState::Task { task, .. } if task.is_finished() => "finished",
            DeferredState::Task { .. } => "running",
            DeferredState::Ready(_) => "ready",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
