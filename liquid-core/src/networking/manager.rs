//! Public entry point for queueing and delivering events
//!
//! A [`NetworkingManager`] owns a small tokio runtime (one worker thread,
//! named `liquid-flush`) on which the flush timer, flush cycles and direct
//! transport calls run. Every public method takes `&self` and the manager is
//! `Send + Sync`, so it can be shared behind an `Arc` between UI callbacks and
//! lifecycle hooks. `enqueue` only takes the queue lock and never waits on
//! the network.
//!
//! The blocking helpers (`flush_blocking`, `send_data`,
//! `get_data_from_endpoint`) park the calling thread until the worker is done.
//! Called from inside any tokio runtime they return [`Error::Runtime`] instead
//! of blocking; async hosts should use `flush` and poll `pending_count`, or
//! call them from `spawn_blocking`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};

use crate::config::NetworkingConfig;
use crate::error::{Error, Result};

use super::event::{Event, HttpMethod, Payload};
use super::flush::{FlushEngine, FlushReport, FlushStats};
use super::queue::EventQueue;
use super::scheduler::FlushScheduler;
use super::store::QueueStore;
use super::transport::{self, FetchResponse, HttpTransport, Transport};

/// Where a new manager's queue comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSource {
    /// Start with an empty queue
    Empty,
    /// Seed the queue from the blob persisted for the token
    Disk,
}

/// Event queue, flush timer and persistence for one API token
pub struct NetworkingManager {
    engine: Arc<FlushEngine>,
    scheduler: FlushScheduler,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl NetworkingManager {
    /// Create a manager with an empty queue and a stopped timer
    pub fn new(token: impl Into<String>, config: &NetworkingConfig) -> Result<Self> {
        Self::with_http(token.into(), config, QueueSource::Empty)
    }

    /// Create a manager whose queue is restored from the blob for `token`
    pub fn from_disk(token: impl Into<String>, config: &NetworkingConfig) -> Result<Self> {
        Self::with_http(token.into(), config, QueueSource::Disk)
    }

    fn with_http(token: String, config: &NetworkingConfig, source: QueueSource) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config, &token)?;
        let store = QueueStore::new(config.resolved_queue_dir());
        Self::with_parts(token, config, store, Arc::new(transport), source)
    }

    /// Create a manager from an explicit store and transport
    pub fn with_parts(
        token: impl Into<String>,
        config: &NetworkingConfig,
        store: QueueStore,
        transport: Arc<dyn Transport>,
        source: QueueSource,
    ) -> Result<Self> {
        config.validate()?;
        let token = token.into();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("liquid-flush")
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(format!("failed to create runtime: {}", e)))?;
        let handle = runtime.handle().clone();

        let restored = match source {
            QueueSource::Empty => Vec::new(),
            QueueSource::Disk => store.unarchive(&token),
        };
        let restored_count = restored.len();
        let (queue, overflow) = EventQueue::with_events(config.queue_size_limit, restored);

        let engine = Arc::new(FlushEngine::new(
            token,
            queue,
            store,
            transport,
            config.batch_size,
            config.persist_on_flush,
        ));
        engine.record_evictions(&overflow);
        let scheduler =
            FlushScheduler::new(handle.clone(), Arc::clone(&engine), config.flush_interval());

        tracing::info!(
            source = ?source,
            restored = restored_count,
            pending = engine.queue().len(),
            queue_size_limit = config.queue_size_limit,
            flush_interval_secs = config.flush_interval_secs,
            "Networking manager created"
        );

        Ok(Self {
            engine,
            scheduler,
            handle,
            runtime: Some(runtime),
        })
    }

    /// The token used for authentication and persistence
    pub fn token(&self) -> &str {
        self.engine.token()
    }

    /// Queue `payload` for delivery to `endpoint`
    pub fn enqueue(&self, payload: Payload, endpoint: impl Into<String>, method: HttpMethod) {
        self.engine.enqueue(Event::new(payload, endpoint, method));
    }

    /// Queue `payload`, parsing `method` from its name
    ///
    /// Unknown methods are rejected without touching the queue.
    pub fn add_to_http_queue(&self, payload: Payload, endpoint: &str, method: &str) -> Result<()> {
        let method = method.parse::<HttpMethod>().map_err(|e| {
            tracing::error!(endpoint, method, "Refusing to queue event with unknown HTTP method");
            e
        })?;
        self.enqueue(payload, endpoint, method);
        Ok(())
    }

    /// Run one flush cycle in the background and return immediately
    pub fn flush(&self) {
        drop(self.scheduler.trigger());
    }

    /// Run one flush cycle and wait for its report
    pub fn flush_blocking(&self) -> Result<FlushReport> {
        ensure_blocking_allowed("flush_blocking")?;
        let cycle = self.scheduler.trigger();
        self.handle
            .block_on(cycle)
            .map_err(|e| Error::Runtime(format!("flush task failed: {}", e)))
    }

    pub fn start_flush_timer(&self) {
        self.scheduler.start();
    }

    pub fn stop_flush_timer(&self) {
        self.scheduler.stop();
    }

    pub fn is_flush_timer_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Persist the current queue for this manager's token
    pub fn archive_queue(&self) -> Result<()> {
        self.engine.persist().map_err(|e| {
            tracing::warn!(error = %e, "Failed to archive event queue");
            e
        })
    }

    /// Events persisted for `token` in the store `config` points at
    pub fn unarchive_queue(token: &str, config: &NetworkingConfig) -> Vec<Event> {
        QueueStore::new(config.resolved_queue_dir()).unarchive(token)
    }

    /// Delete the queue persisted for `token` in the store `config` points at
    ///
    /// A later `from_disk` with the same config starts empty.
    pub fn delete_queue(token: &str, config: &NetworkingConfig) -> Result<()> {
        QueueStore::new(config.resolved_queue_dir()).delete(token)
    }

    /// Send `body` to `endpoint` on the worker runtime and wait for the status
    pub fn send_data(&self, body: Vec<u8>, endpoint: &str, method: HttpMethod) -> Result<u16> {
        let transport = self.engine.transport();
        let endpoint = endpoint.to_string();
        self.run_on_worker(async move { transport.send(body, &endpoint, method).await })
    }

    /// Fetch `endpoint` on the worker runtime and wait for the response
    pub fn get_data_from_endpoint(&self, endpoint: &str) -> Result<FetchResponse> {
        let transport = self.engine.transport();
        let endpoint = endpoint.to_string();
        self.run_on_worker(async move { transport.fetch(&endpoint).await })
    }

    fn run_on_worker<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        ensure_blocking_allowed("direct transport call")?;
        let spawned = self.handle.spawn(task);
        self.handle
            .block_on(spawned)
            .map_err(|e| Error::Runtime(format!("worker task failed: {}", e)))?
    }

    pub fn queue_size_limit(&self) -> usize {
        self.engine.queue().limit()
    }

    /// Change the queue bound; shrinking evicts the oldest events right away
    pub fn set_queue_size_limit(&self, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(Error::Config(
                "queue_size_limit must be at least 1".to_string(),
            ));
        }
        let evicted = self.engine.queue().set_limit(limit);
        self.engine.record_evictions(&evicted);
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    /// Change the flush interval; a running timer restarts immediately
    pub fn set_flush_interval(&self, secs: u64) -> Result<()> {
        if secs == 0 {
            return Err(Error::Config(
                "flush_interval must be at least 1 second".to_string(),
            ));
        }
        self.scheduler.set_interval(Duration::from_secs(secs));
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.engine.queue().len()
    }

    pub fn has_pending(&self) -> bool {
        !self.engine.queue().is_empty()
    }

    /// Ordered copy of the queued events
    pub fn pending_events(&self) -> Vec<Event> {
        self.engine.queue().snapshot()
    }

    pub fn stats(&self) -> FlushStats {
        self.engine.stats()
    }

    pub fn store(&self) -> &QueueStore {
        self.engine.store()
    }

    /// User agent attached to every request
    pub fn user_agent() -> &'static str {
        transport::user_agent()
    }
}

/// `Handle::block_on` panics inside a runtime, so refuse before getting there
fn ensure_blocking_allowed(operation: &str) -> Result<()> {
    if Handle::try_current().is_ok() {
        tracing::error!(operation, "Blocking call made from inside an async runtime");
        return Err(Error::Runtime(format!(
            "{} cannot block inside an async runtime",
            operation
        )));
    }
    Ok(())
}

impl Drop for NetworkingManager {
    fn drop(&mut self) {
        self.scheduler.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
