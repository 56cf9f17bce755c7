use std::future::Future;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Configuration for a [`Reactor`].
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Number of I/O worker threads. Default: 2.
    pub worker_threads: usize,
    /// Thread name prefix for diagnostics.
    pub thread_name: String,
    /// How long dropping the reactor waits for in-flight tasks.
    pub shutdown_timeout: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            thread_name: "msgnet-io".to_string(),
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

/// Explicitly owned async I/O reactor.
///
/// Wraps a multi-threaded tokio runtime. Completion work for accepts, reads
/// and writes runs on whichever worker thread is free, so anything touched
/// from a task must be thread-safe.
///
/// A reactor must be created and dropped from an ordinary thread, never from
/// inside another async runtime.
pub struct Reactor {
    runtime: Option<Runtime>,
    shutdown_timeout: Duration,
}

impl Reactor {
    /// Build and start a reactor with explicit configuration.
    pub fn new(config: ReactorConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .enable_io()
            .enable_time()
            .build()
            .map_err(TransportError::Runtime)?;

        debug!(
            workers = config.worker_threads.max(1),
            name = %config.thread_name,
            "reactor started"
        );

        Ok(Self {
            runtime: Some(runtime),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Build a reactor with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ReactorConfig::default())
    }

    /// A cloneable handle for spawning onto this reactor.
    pub fn handle(&self) -> Result<Handle> {
        self.runtime()
            .map(|runtime| runtime.handle().clone())
    }

    /// Spawn a task onto the reactor's worker threads.
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Ok(self.runtime()?.spawn(future))
    }

    /// Run a future to completion, blocking the calling thread.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        Ok(self.runtime()?.block_on(future))
    }

    /// Whether the reactor is still running.
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Stop the reactor, giving in-flight tasks the configured grace period.
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.shutdown_timeout);
            debug!("reactor stopped");
        }
    }

    fn runtime(&self) -> Result<&Runtime> {
        self.runtime.as_ref().ok_or(TransportError::Shutdown)
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("running", &self.is_running())
            .finish()
    }
}
