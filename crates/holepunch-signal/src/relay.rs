//! Broadcast fan-out with eviction of unwritable connections.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::{ConnectionId, SignalMessage};
use crate::registry::ConnectionRegistry;

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the message was written to
    pub delivered: usize,
    /// Connections whose send failed and were evicted
    pub evicted: Vec<ConnectionId>,
}

enum Delivery {
    Sent,
    Evicted(ConnectionId),
}

/// Fans each message out to every other registered connection
#[derive(Clone)]
pub struct BroadcastRelay {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastRelay {
    /// Create a relay over `registry`
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Registry this relay delivers to
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send `message` from `source` to every other registered connection.
    ///
    /// Each target gets one attempt, in registration order. A target whose
    /// send fails is closed and removed; delivery to the rest continues.
    pub async fn broadcast(&self, source: ConnectionId, message: &SignalMessage) -> BroadcastReport {
        let registry = &self.registry;

        let outcomes = registry
            .for_each_other(source, |target| async move {
                let id = target.id();
                match target.send(message).await {
                    Ok(()) => Delivery::Sent,
                    Err(e) => {
                        warn!(conn_id = %id, error = %e, "Broadcast failed, evicting connection");
                        target.close().await;
                        registry.remove(id).await;
                        Delivery::Evicted(id)
                    }
                }
            })
            .await;

        let mut report = BroadcastReport::default();
        for outcome in outcomes {
            match outcome {
                Delivery::Sent => report.delivered += 1,
                Delivery::Evicted(id) => report.evicted.push(id),
            }
        }

        debug!(
            conn_id = %source,
            bytes = message.len(),
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "Relayed message"
        );
        report
    }
}
