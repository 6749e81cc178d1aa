//! Event queueing and delivery
//!
//! This module buffers events bound for the Liquid collector, keeps them on
//! disk across restarts and delivers them in batches.
//!
//! ## Architecture
//!
//! - [`EventQueue`]: bounded FIFO, drop-oldest on overflow
//! - [`QueueStore`]: one JSON blob per API token
//! - [`Transport`]: one request per call; [`HttpTransport`] in production
//! - [`FlushScheduler`]: repeating timer that triggers flush cycles
//! - [`NetworkingManager`]: facade tying the above together
//!
//! A flush cycle takes up to `batch_size` events from the head of the queue,
//! sends one request per `(endpoint, method)` pair and commits the groups the
//! server accepted (2xx) or rejected for good (4xx except 408/429). Anything
//! else stays queued and is retried on the next tick.
//!
//! ## Usage
//!
//! ```toml
//! [networking]
//! server_url = "https://api.lqd.io/collect/"
//! queue_size_limit = 1000
//! flush_interval_secs = 60
//! ```

mod event;
mod flush;
mod manager;
mod queue;
mod scheduler;
mod store;
mod transport;

pub use event::{group_by_route, Event, HttpMethod, Payload, RouteBatch};
pub use flush::{FlushEngine, FlushReport, FlushStats};
pub use manager::{NetworkingManager, QueueSource};
pub use queue::EventQueue;
pub use scheduler::FlushScheduler;
pub use store::QueueStore;
pub use transport::{
    classify_status, resolve_url, user_agent, Delivery, FetchResponse, HttpTransport, Transport,
};
