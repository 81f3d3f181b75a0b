//! Subscription registry and per-job event delivery.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

use siteaudit_core::event::ScanEvent;
use siteaudit_core::types::JobId;

/// Channel sender half used to push events to one observer connection.
///
/// The channel is unbounded and order-preserving, so events published for
/// a job arrive at each observer in publish order.
pub type ObserverSender = mpsc::UnboundedSender<ScanEvent>;

/// Fans events out to every observer subscribed to a job id.
///
/// Thread-safe via an interior `RwLock`; designed to be wrapped in `Arc`
/// and shared between the orchestrator (publisher) and the WebSocket
/// layer (subscriber churn).
pub struct ScanBroadcaster {
    /// job id -> (connection id -> sender).
    subscriptions: RwLock<HashMap<JobId, HashMap<String, ObserverSender>>>,
}

impl ScanBroadcaster {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Register `sender` to receive events for `job_id`.
    ///
    /// Idempotent per (job, connection): re-subscribing replaces the
    /// existing membership entry, so an observer receives each event once
    /// no matter how many times it subscribes.
    pub async fn subscribe(&self, job_id: JobId, conn_id: &str, sender: ObserverSender) {
        let mut subs = self.subscriptions.write().await;
        subs.entry(job_id)
            .or_default()
            .insert(conn_id.to_string(), sender);
        tracing::debug!(job_id, conn_id, "Observer subscribed");
    }

    /// Remove one connection's subscription to one job.
    pub async fn unsubscribe(&self, job_id: JobId, conn_id: &str) {
        let mut subs = self.subscriptions.write().await;
        if let Some(observers) = subs.get_mut(&job_id) {
            observers.remove(conn_id);
            if observers.is_empty() {
                subs.remove(&job_id);
            }
        }
    }

    /// Remove a connection from every job registry (connection closed).
    pub async fn disconnect(&self, conn_id: &str) {
        let mut subs = self.subscriptions.write().await;
        subs.retain(|_, observers| {
            observers.remove(conn_id);
            !observers.is_empty()
        });
    }

    /// Deliver `event` to every observer currently subscribed to `job_id`.
    ///
    /// Observers whose channel has closed are silently evicted; a dead or
    /// slow observer never blocks delivery to the others or surfaces an
    /// error to the publisher. Returns the number of live deliveries.
    pub async fn publish(&self, job_id: JobId, event: &ScanEvent) -> usize {
        let mut delivered = 0;
        let dead: Vec<String> = {
            let subs = self.subscriptions.read().await;
            let Some(observers) = subs.get(&job_id) else {
                return 0;
            };
            observers
                .iter()
                .filter(|(_, sender)| {
                    let ok = sender.send(event.clone()).is_ok();
                    delivered += usize::from(ok);
                    !ok
                })
                .map(|(conn_id, _)| conn_id.clone())
                .collect()
        };

        if !dead.is_empty() {
            let mut subs = self.subscriptions.write().await;
            if let Some(observers) = subs.get_mut(&job_id) {
                for conn_id in &dead {
                    observers.remove(conn_id);
                    tracing::debug!(job_id, conn_id = %conn_id, "Dropped closed observer connection");
                }
                if observers.is_empty() {
                    subs.remove(&job_id);
                }
            }
        }

        delivered
    }

    /// Number of observers currently subscribed to `job_id`.
    pub async fn subscriber_count(&self, job_id: JobId) -> usize {
        self.subscriptions
            .read()
            .await
            .get(&job_id)
            .map_or(0, |o| o.len())
    }
}

impl Default for ScanBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
