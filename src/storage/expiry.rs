//! Background Expiry Sweeper
//!
//! Lazy expiry alone never reclaims a key that expires and is never read
//! again. When enabled, this task periodically calls
//! [`Keyspace::purge_expired`] so such entries don't stay in memory forever.
//!
//! ## Adaptive Frequency
//!
//! If many keys are expiring, the sweeper will run more frequently.
//! If few keys are expiring, it will back off to save CPU.

use crate::storage::Keyspace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 1s)
    pub max_interval: Duration,

    /// If this fraction of stored keys were purged, speed up sweeping
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

impl ExpiryConfig {
    /// Default configuration with a different base interval.
    pub fn with_interval(base_interval: Duration) -> Self {
        Self {
            base_interval,
            min_interval: base_interval.min(Duration::from_millis(10)),
            max_interval: base_interval.max(Duration::from_secs(1)),
            ..Default::default()
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(keyspace: Arc<Keyspace>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = config.base_interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        tokio::spawn(sweeper_loop(keyspace, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    keyspace: Arc<Keyspace>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let keys_before = keyspace.len();
        let expired = keyspace.purge_expired();

        if keys_before == 0 {
            continue;
        }

        let expiry_rate = expired as f64 / keys_before as f64;
        if expiry_rate > config.speedup_threshold {
            current_interval = (current_interval / 2).max(config.min_interval);
            debug!(
                expired,
                rate = %format!("{:.2}%", expiry_rate * 100.0),
                new_interval_ms = current_interval.as_millis() as u64,
                "High expiry rate, speeding up sweeper"
            );
        } else if expired == 0 {
            current_interval = (current_interval * 2).min(config.max_interval);
            trace!(
                new_interval_ms = current_interval.as_millis() as u64,
                "Nothing expired, slowing down sweeper"
            );
        }

        if expired > 0 {
            debug!(
                expired,
                keys_remaining = keyspace.len(),
                "Expired keys cleaned up"
            );
        }
    }
}
