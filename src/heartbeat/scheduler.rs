//! Heartbeat scheduler
//!
//! A background task that periodically sends a `periodic_update` envelope
//! with the registry's stats to every open connection. The first firing
//! happens one full period after start. The task is owned through a
//! [`HeartbeatHandle`]; shutting the handle down (or dropping it) stops the
//! timer, and `shutdown` waits until the task has exited.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastEngine, BroadcastReport};
use crate::protocol::{self, ServerMessage, ServerStats};
use crate::registry::ConnectionRegistry;

pub const HEARTBEAT_MESSAGE: &str = "Server heartbeat";

/// `tokio::time::interval` rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    registry: Arc<ConnectionRegistry>,
    broadcaster: BroadcastEngine,
    period: Duration,
}

impl HeartbeatScheduler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: BroadcastEngine,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs a single firing. Returns `None` when nobody is connected.
    pub fn emit(&self) -> Option<BroadcastReport> {
        if self.registry.is_empty() {
            return None;
        }

        let snapshot = self.registry.snapshot();
        let envelope = ServerMessage::PeriodicUpdate {
            message: HEARTBEAT_MESSAGE.to_string(),
            server_stats: ServerStats {
                connected_clients: snapshot.connected_clients,
                total_messages: snapshot.total_messages,
                uptime: snapshot.uptime_seconds,
            },
            timestamp: protocol::timestamp(),
        };

        let report = self.broadcaster.fan_out(&envelope, None);
        info!("Sent periodic update to {} clients", report.delivered());
        Some(report)
    }

    /// Starts the timer on the current tokio runtime.
    pub fn spawn(self) -> HeartbeatHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // fires on an explicit shutdown and when the handle is dropped
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        self.emit();
                    }
                }
            }

            debug!("Heartbeat stopped");
        });

        HeartbeatHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner of a running heartbeat task.
#[derive(Debug)]
pub struct HeartbeatHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Stops the timer and waits for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!("Heartbeat task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
