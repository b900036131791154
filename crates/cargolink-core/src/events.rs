//! Decision bus for handing routed ingress decisions to presentation.
//!
//! The ingress worker publishes every [`RoutedDecision`] on a single
//! broadcast channel. Presentation consumers (overlay, notification tray,
//! list screens) subscribe independently. Emission is fire-and-forget: the
//! coordinator never waits for a consumer to acknowledge.

use tokio::sync::broadcast;

use crate::models::RoutedDecision;

/// Broadcast-based bus distributing routed decisions to multiple consumers.
///
/// Uses `tokio::sync::broadcast` with a configurable buffer size. Slow
/// receivers that fall behind receive a `Lagged` error and miss decisions.
#[derive(Clone)]
pub struct DecisionBus {
    tx: broadcast::Sender<RoutedDecision>,
}

impl DecisionBus {
    /// Create a new bus with the given buffer capacity.
    ///
    /// Recommended: [`crate::defaults::DECISION_BUS_CAPACITY`] for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a decision to all subscribers.
    ///
    /// If there are no active subscribers, the decision is silently dropped.
    pub fn emit(&self, decision: RoutedDecision) {
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            decision_id = %decision.decision_id,
            kind = ?decision.kind,
            broadcast_id = %decision.broadcast_id,
            subscriber_count,
            "DecisionBus emit"
        );
        let _ = self.tx.send(decision);
    }

    /// Subscribe to routed decisions. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RoutedDecision> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for DecisionBus {
    fn default() -> Self {
        Self::new(crate::defaults::DECISION_BUS_CAPACITY)
    }
}
