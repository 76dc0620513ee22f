//! AdapterHandle - runs an AdapterLogic with reconnect-on-failure
//!
//! The follower only knows how to run one connection until it drops. Retrying,
//! backoff and shutdown handling live here so there is exactly one retry loop.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::traits::{AdapterContext, AdapterLogic};
use crate::bus::{BusEvent, SharedBus};

/// Retry configuration for reconnect attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Backoff caps at this value
    pub max_delay: Duration,
    /// A run lasting at least this long resets the backoff to `initial_delay`
    pub stable_run_threshold: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            stable_run_threshold: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }
}

/// Exponential backoff state for one handle
#[derive(Debug)]
struct Backoff {
    config: RetryConfig,
    current: Duration,
}

impl Backoff {
    fn new(config: RetryConfig) -> Self {
        let current = config.initial_delay;
        Self { config, current }
    }

    /// Delay to wait after a run of `ran_for` failed. Advances the backoff.
    fn next_delay(&mut self, ran_for: Duration) -> Duration {
        if ran_for >= self.config.stable_run_threshold {
            self.current = self.config.initial_delay;
        }
        let delay = self.current;
        self.current = (self.current * 2).min(self.config.max_delay);
        delay
    }
}

pub struct AdapterHandle<T: AdapterLogic> {
    logic: Arc<T>,
    bus: SharedBus,
    shutdown: CancellationToken,
}

impl<T: AdapterLogic> AdapterHandle<T> {
    pub fn new(logic: T, bus: SharedBus, shutdown: CancellationToken) -> Self {
        Self {
            logic: Arc::new(logic),
            bus,
            shutdown,
        }
    }

    /// Run until a clean exit or shutdown, retrying failed runs with backoff.
    ///
    /// Always publishes `AdapterStopped` on the way out.
    pub async fn run_with_retry(self, config: RetryConfig) -> Result<()> {
        let prefix = self.logic.prefix();
        let mut backoff = Backoff::new(config);

        while !self.shutdown.is_cancelled() {
            let started = Instant::now();
            let Err(e) = self.run_once().await else {
                info!("{}: run finished", prefix);
                break;
            };

            let delay = backoff.next_delay(started.elapsed());
            warn!("{}: {}, retrying in {:?}", prefix, e, delay);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("{}: shutdown while waiting to reconnect", prefix);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.bus.publish(BusEvent::AdapterStopped {
            adapter: prefix.to_string(),
        });
        info!("{}: stopped", prefix);
        Ok(())
    }

    /// One attempt: init, then run until it returns, ShuttingDown, or cancel.
    async fn run_once(&self) -> Result<()> {
        let prefix = self.logic.prefix();

        if let Err(e) = self.logic.init().await {
            error!("{}: init failed: {}", prefix, e);
            return Err(e);
        }

        // Subscribe before running so a ShuttingDown published meanwhile is seen
        let rx = self.bus.subscribe();
        let ctx = AdapterContext {
            bus: self.bus.clone(),
            shutdown: self.shutdown.clone(),
        };

        tokio::select! {
            result = self.logic.run(ctx) => result,
            _ = shutting_down(rx) => {
                info!("{}: ShuttingDown on bus", prefix);
                Ok(())
            }
            _ = self.shutdown.cancelled() => {
                info!("{}: cancelled", prefix);
                Ok(())
            }
        }
    }
}

/// Resolves on `BusEvent::ShuttingDown` or when the bus closes
async fn shutting_down(mut rx: broadcast::Receiver<BusEvent>) {
    loop {
        match rx.recv().await {
            Ok(BusEvent::ShuttingDown) | Err(RecvError::Closed) => return,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
        }
    }
}
