//! Repeating flush timer
//!
//! The timer is a task on the manager's runtime. Every tick spawns the flush
//! cycle as a separate task, so stopping the timer cancels future ticks but
//! never an in-flight send.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::flush::{FlushEngine, FlushReport};

struct TimerState {
    interval: Duration,
    ticker: Option<JoinHandle<()>>,
}

/// Stopped/running flush timer bound to one engine
pub struct FlushScheduler {
    handle: Handle,
    engine: Arc<FlushEngine>,
    state: Mutex<TimerState>,
}

impl FlushScheduler {
    /// Create a stopped scheduler
    pub fn new(handle: Handle, engine: Arc<FlushEngine>, interval: Duration) -> Self {
        Self {
            handle,
            engine,
            state: Mutex::new(TimerState {
                interval,
                ticker: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start ticking; no-op if already running
    ///
    /// The first tick fires one interval after start.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.ticker.is_some() {
            return;
        }
        state.ticker = Some(self.spawn_ticker(state.interval));
        tracing::debug!(interval_secs = state.interval.as_secs(), "Flush timer started");
    }

    /// Stop ticking; no-op if already stopped
    pub fn stop(&self) {
        if let Some(ticker) = self.lock().ticker.take() {
            ticker.abort();
            tracing::debug!("Flush timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().ticker.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.lock().interval
    }

    /// Change the tick interval, restarting the timer if it is running
    pub fn set_interval(&self, interval: Duration) {
        let mut state = self.lock();
        state.interval = interval;
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
            state.ticker = Some(self.spawn_ticker(interval));
            tracing::debug!(
                interval_secs = interval.as_secs(),
                "Flush timer restarted with new interval"
            );
        }
    }

    /// Dispatch one flush cycle on the runtime
    pub fn trigger(&self) -> JoinHandle<FlushReport> {
        let engine = Arc::clone(&self.engine);
        self.handle.spawn(async move { engine.run_cycle().await })
    }

    fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        self.handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine.run_cycle().await;
                });
            }
        })
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
