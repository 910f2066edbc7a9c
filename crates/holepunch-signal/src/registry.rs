//! Registry of live relay connections.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use crate::connection::{Connection, ConnectionId};

/// Concurrency-safe set of registered connections
///
/// Every operation takes the lock for its own duration only. Iteration works
/// on a snapshot, so callbacks may add or remove connections freely.
pub struct ConnectionRegistry {
    /// Registered connections, ordered by registration
    connections: RwLock<BTreeMap<ConnectionId, Arc<dyn Connection>>>,
    /// Next id to hand out
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh connection id
    pub fn allocate_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a connection
    ///
    /// Returns `false` without replacing anything if the id is already present.
    pub async fn add(&self, connection: Arc<dyn Connection>) -> bool {
        let id = connection.id();
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, connection);
        debug!(conn_id = %id, total = connections.len(), "Connection registered");
        true
    }

    /// Deregister a connection; removing an absent id is a no-op
    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<dyn Connection>> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id);
        if removed.is_some() {
            debug!(conn_id = %id, total = connections.len(), "Connection deregistered");
        }
        removed
    }

    /// Whether `id` is registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connections are registered
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Registered connections other than `excluding`, in registration order
    pub async fn snapshot_except(&self, excluding: ConnectionId) -> Vec<Arc<dyn Connection>> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(id, _)| **id != excluding)
            .map(|(_, conn)| Arc::clone(conn))
            .collect()
    }

    /// Run `f` once for every connection other than `excluding`
    ///
    /// The set is snapshotted first and the lock released before `f` runs, so
    /// `f` may call back into the registry. Connections registered during the
    /// iteration are not visited. Results are returned in visiting order.
    pub async fn for_each_other<F, Fut, T>(&self, excluding: ConnectionId, mut f: F) -> Vec<T>
    where
        F: FnMut(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = T>,
    {
        let targets = self.snapshot_except(excluding).await;
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(f(target).await);
        }
        results
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
