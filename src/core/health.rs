//! # Health Monitor
//!
//! Polls `GET /` on a fixed interval, independent of any conversation.
//! The task lives exactly as long as its [`HealthMonitor`] handle.

use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::ApiClient;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub is_up: bool,
    pub is_checking: bool,
}

impl Default for HealthStatus {
    /// Nothing known yet: checking, assumed offline.
    fn default() -> Self {
        Self {
            is_up: false,
            is_checking: true,
        }
    }
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        if self.is_checking {
            "Checking API..."
        } else if self.is_up {
            "API is Online"
        } else {
            "API is Offline"
        }
    }
}

/// One liveness check. Any failure, timeout included, counts as offline.
pub async fn check_once(client: &ApiClient, timeout: Duration) -> bool {
    match client.health(timeout).await {
        Ok(up) => up,
        Err(e) => {
            debug!("Health check failed ({}): {}", e.kind(), e);
            false
        }
    }
}

/// Handle to the background monitor. Dropping it stops the monitor.
pub struct HealthMonitor {
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        debug!("Stopping health monitor");
        self.handle.abort();
    }
}

/// Starts probing right away, then every `interval` (at least one second).
///
/// `on_update` is called with the checking state before each request and
/// with the result after it.
pub fn spawn_health_monitor<F>(
    client: ApiClient,
    interval: Duration,
    timeout: Duration,
    on_update: F,
) -> HealthMonitor
where
    F: Fn(HealthStatus) + Send + 'static,
{
    let interval = interval.max(MIN_INTERVAL);
    info!(
        "Health check every {:?} against {}",
        interval,
        client.base_url()
    );
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_up = None;

        loop {
            ticker.tick().await;
            on_update(HealthStatus {
                is_up: last_up.unwrap_or(false),
                is_checking: true,
            });

            let is_up = check_once(&client, timeout).await;
            if last_up != Some(is_up) {
                info!("Backend is {}", if is_up { "online" } else { "offline" });
            }
            last_up = Some(is_up);

            on_update(HealthStatus {
                is_up,
                is_checking: false,
            });
        }
    });
    HealthMonitor { handle }
}
