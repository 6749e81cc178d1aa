//! # liquid-core
//!
//! Client-side event queueing and delivery for the Liquid SDK.
//!
//! This library provides:
//! - A bounded, thread-safe event queue with drop-oldest admission
//! - Token-keyed persistence so pending events survive restarts
//! - A periodic flush loop delivering batches over HTTP
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use liquid_core::{Config, HttpMethod, NetworkingManager, Payload};
//!
//! let config = Config::load().expect("failed to load config");
//! let manager = NetworkingManager::from_disk("app-token", &config.networking)
//!     .expect("failed to create manager");
//!
//! let mut payload = Payload::new();
//! payload.insert("name".into(), "app_opened".into());
//! manager.enqueue(payload, "users/42/events", HttpMethod::Post);
//!
//! manager.start_flush_timer();
//! // ... on background:
//! manager.archive_queue().expect("failed to archive queue");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, LoggingConfig, NetworkingConfig};
pub use error::{Error, Result};
pub use networking::{
    Event, FetchResponse, FlushReport, FlushStats, HttpMethod, HttpTransport, NetworkingManager,
    Payload, QueueSource, QueueStore, Transport,
};

// Public modules
pub mod config;
pub mod error;
pub mod logging;
pub mod networking;
