//! Ingress worker: single consumer task driving the coordinator.
//!
//! Both transports submit envelopes through a cloneable [`IngressHandle`].
//! One task drains the bounded queue, so the tombstone check and dedup mark
//! for an envelope happen atomically with respect to every other envelope.
//! Decisions are published on a [`DecisionBus`] without waiting for
//! consumers.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use cargolink_core::{
    logging, DecisionBus, Error, IngressEnvelope, RawIngress, Result, RoutedDecision,
};

use crate::config::IngressConfig;
use crate::coordinator::{IngressCoordinator, IngressStats};

/// Commands accepted by the worker loop.
enum IngressCommand {
    Envelope(IngressEnvelope),
    Stats(oneshot::Sender<IngressStats>),
    Reset(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Default clock for transports stamping `received_at_ms`. The worker never
/// reads it: tombstones are purged against envelope time only.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Handle for submitting envelopes to, and controlling, a running worker.
#[derive(Clone)]
pub struct IngressHandle {
    tx: mpsc::Sender<IngressCommand>,
    bus: DecisionBus,
}

impl IngressHandle {
    /// Queue an envelope, waiting for queue space.
    pub async fn submit(&self, envelope: IngressEnvelope) -> Result<()> {
        self.tx
            .send(IngressCommand::Envelope(envelope))
            .await
            .map_err(|_| Error::Channel("ingress worker is not running".into()))
    }

    /// Queue an envelope without waiting; for transport callbacks that must
    /// not block. Fails when the queue is full or the worker is gone.
    pub fn try_submit(&self, envelope: IngressEnvelope) -> Result<()> {
        self.tx
            .try_send(IngressCommand::Envelope(envelope))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Ingress queue full, dropping envelope");
                    Error::Channel("ingress queue full".into())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    Error::Channel("ingress worker is not running".into())
                }
            })
    }

    /// Normalize a raw transport event and queue it.
    pub async fn submit_raw(&self, raw: RawIngress) -> Result<()> {
        self.submit(IngressEnvelope::from_raw(raw)).await
    }

    /// Subscribe to routed decisions.
    pub fn decisions(&self) -> broadcast::Receiver<RoutedDecision> {
        self.bus.subscribe()
    }

    /// Snapshot of the coordinator's counters, after all previously queued envelopes.
    pub async fn stats(&self) -> Result<IngressStats> {
        let (tx, rx) = oneshot::channel();
        self.send_control(IngressCommand::Stats(tx)).await?;
        rx.await
            .map_err(|_| Error::Channel("ingress worker stopped".into()))
    }

    /// Clear all ingress state (logout / session teardown).
    pub async fn reset(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_control(IngressCommand::Reset(tx)).await?;
        rx.await
            .map_err(|_| Error::Channel("ingress worker stopped".into()))
    }

    /// Stop the worker after it drains everything queued before this call.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_control(IngressCommand::Shutdown(tx)).await?;
        rx.await
            .map_err(|_| Error::Channel("ingress worker stopped".into()))
    }

    async fn send_control(&self, command: IngressCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::Channel("ingress worker is not running".into()))
    }
}

/// Owns the coordinator for the lifetime of a session.
pub struct IngressWorker {
    coordinator: IngressCoordinator,
    config: IngressConfig,
    bus: DecisionBus,
}

impl IngressWorker {
    pub fn new(coordinator: IngressCoordinator, config: IngressConfig) -> Self {
        let bus = DecisionBus::new(config.decision_bus_capacity);
        Self {
            coordinator,
            config,
            bus,
        }
    }

    /// Publish on an existing bus instead of a private one.
    pub fn with_bus(mut self, bus: DecisionBus) -> Self {
        self.bus = bus;
        self
    }

    /// Spawn the worker loop and return a handle for control.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> IngressHandle {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let handle = IngressHandle {
            tx,
            bus: self.bus.clone(),
        };

        tokio::spawn(async move {
            self.run(rx).await;
        });

        handle
    }

    #[instrument(skip(self, rx), fields(subsystem = "ingress", component = "worker"))]
    async fn run(mut self, mut rx: mpsc::Receiver<IngressCommand>) {
        if !self.config.enabled {
            info!("Ingress worker is disabled, not starting");
            return;
        }

        info!(
            { logging::COMPONENT } = "worker",
            queue_capacity = self.config.queue_capacity,
            tombstone_ttl_ms = self.config.tombstone_ttl_ms,
            dedup_capacity = self.config.dedup_capacity,
            "Ingress worker started"
        );

        let mut purge = tokio::time::interval(Duration::from_millis(
            self.config.purge_interval_ms.max(1),
        ));
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        purge.tick().await;

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        debug!("All ingress handles dropped");
                        break;
                    };
                    if let Some(ack) = self.handle(command) {
                        let _ = ack.send(());
                        break;
                    }
                }
                _ = purge.tick() => {
                    self.coordinator.purge_observed();
                }
            }
        }

        let stats = self.coordinator.stats();
        info!(
            received = stats.received,
            emitted = stats.emitted,
            duplicates = stats.duplicates,
            suppressed = stats.suppressed,
            "Ingress worker stopped"
        );
    }

    /// Apply one command. Returns the shutdown ack when the loop must stop.
    fn handle(&mut self, command: IngressCommand) -> Option<oneshot::Sender<()>> {
        match command {
            IngressCommand::Envelope(envelope) => {
                if let Some(decision) = self.coordinator.ingest(envelope) {
                    self.bus.emit(decision);
                }
                None
            }
            IngressCommand::Stats(reply) => {
                let _ = reply.send(self.coordinator.stats());
                None
            }
            IngressCommand::Reset(reply) => {
                self.coordinator.reset();
                let _ = reply.send(());
                None
            }
            IngressCommand::Shutdown(ack) => {
                info!("Ingress worker received shutdown signal");
                Some(ack)
            }
        }
    }
}
