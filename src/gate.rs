//! Per-user serialization of delivery cycles.
//!
//! One lock per originating user, created atomically on first access.
//! The guard is held for the whole download+upload+lifecycle cycle, so
//! a user never has two deliveries in flight; locks for distinct users
//! are fully independent. `tokio::sync::Mutex` queues waiters in FIFO
//! order, so a second selection from the same user waits its turn
//! rather than starving.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identifier of an end user, as assigned by the transport.
pub type UserId = i64;

/// Process-scoped map of per-user delivery locks, shared by cheap clone.
#[derive(Clone, Default)]
pub struct UserGate {
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserGate {
    /// Creates an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the delivery lock for a user, waiting behind any
    /// in-flight cycle of the same user. The lock entry is created
    /// atomically on first use.
    pub async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(user).or_default().value());
        lock.lock_owned().await
    }

    /// Number of users that have ever acquired the gate.
    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.locks.len()
    }
}
