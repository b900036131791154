//! Ingress coordinator: one routed decision per unique ingress event.
//!
//! Per envelope:
//!
//! 1. Canonicalize the raw name; carrier names fall back to payload types.
//! 2. Unroutable envelopes are dropped.
//! 3. Roles that cannot handle broadcast ingress are skipped.
//! 4. Envelopes without a broadcast id are dropped as malformed.
//! 5. Cancellations record a tombstone, then dedup.
//! 6. New broadcasts are suppressed while their id is tombstoned, then dedup.
//! 7. Status updates dedup only.
//!
//! The coordinator exclusively owns its tombstone store and dedup engine.
//! It takes `&mut self`, so concurrent transports reach it through the
//! single-consumer queue in [`crate::worker`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace};
use uuid::Uuid;

use cargolink_core::{
    logging, DecisionKind, DedupKey, EventClass, IngressEnvelope, RoutedDecision,
};

use crate::canonical::{canonicalize_with, is_generic_carrier, normalize};
use crate::config::{IngressConfig, RoutingTables};
use crate::dedup::DedupEngine;
use crate::diagnostics::{
    DiagnosticRecord, DiagnosticsSink, Stage, Status, TracingDiagnostics, ATTR_BROADCAST_ID,
    ATTR_EFFECTIVE_EVENT, ATTR_EVENT_CLASS, ATTR_RAW_EVENT, ATTR_SOURCE,
};
use crate::policy::{can_handle_broadcast_ingress, RoleProvider};
use crate::resolver::{resolve, FallbackRoute};
use crate::tombstone::TombstoneStore;

/// Result of canonicalization plus fallback resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub class: EventClass,
    /// Normalized raw name for direct and name-fallback matches, normalized
    /// payload type for payload matches, empty when unroutable.
    pub effective_event: String,
}

impl Classification {
    fn unroutable() -> Self {
        Self {
            class: EventClass::Unroutable,
            effective_event: String::new(),
        }
    }
}

/// Classify an envelope against `tables`.
pub fn classify(tables: &RoutingTables, envelope: &IngressEnvelope) -> Classification {
    let raw = normalize(&envelope.raw_event_name);

    let direct = canonicalize_with(tables, &raw);
    if direct.is_routable() {
        return Classification {
            class: direct,
            effective_event: raw,
        };
    }

    if !is_generic_carrier(tables, &raw) {
        return Classification::unroutable();
    }

    let fallback = resolve(
        &raw,
        envelope.payload_type.as_deref(),
        envelope.legacy_payload_type.as_deref(),
        tables,
    );
    if fallback.route == FallbackRoute::Cancellation {
        return Classification {
            class: EventClass::Cancellation,
            effective_event: fallback.effective_event.unwrap_or(raw),
        };
    }

    // Status updates are not covered by the resolver but still arrive on
    // carrier names, including the ones the resolver treats as a broadcast
    // signal on their own.
    if let Some(update) = payload_class(tables, envelope, EventClass::StatusUpdate) {
        return update;
    }

    if fallback.route == FallbackRoute::Broadcast {
        return Classification {
            class: EventClass::NewBroadcast,
            effective_event: fallback.effective_event.unwrap_or(raw),
        };
    }

    Classification::unroutable()
}

/// First payload type (primary, then legacy) canonicalizing to `class`.
fn payload_class(
    tables: &RoutingTables,
    envelope: &IngressEnvelope,
    class: EventClass,
) -> Option<Classification> {
    [&envelope.payload_type, &envelope.legacy_payload_type]
        .into_iter()
        .flatten()
        .find(|ty| canonicalize_with(tables, ty) == class)
        .map(|ty| Classification {
            class,
            effective_event: normalize(ty),
        })
}

/// Build the dedup key for an envelope already classified as `class`.
///
/// Uses the class, never the raw name, so aliases from different transports
/// collapse to one key.
pub fn dedup_key(class: EventClass, envelope: &IngressEnvelope) -> DedupKey {
    let version = envelope
        .payload_version
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    DedupKey::new(class, envelope.normalized_id.trim(), version)
}

/// Running counters of ingress outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngressStats {
    pub received: u64,
    pub emitted: u64,
    pub duplicates: u64,
    pub suppressed: u64,
    pub unroutable: u64,
    pub role_denied: u64,
    pub malformed: u64,
}

/// Owns all ingress state for one session.
pub struct IngressCoordinator {
    tables: RoutingTables,
    tombstones: TombstoneStore,
    dedup: DedupEngine,
    roles: Arc<dyn RoleProvider>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    stats: IngressStats,
    /// Latest `received_at_ms` observed; the coordinator's clock.
    high_water_ms: Option<i64>,
}

impl IngressCoordinator {
    /// Create a coordinator with default routing tables and tracing diagnostics.
    pub fn new(config: &IngressConfig, roles: Arc<dyn RoleProvider>) -> Self {
        Self {
            tables: RoutingTables::default(),
            tombstones: TombstoneStore::new(config.tombstone_ttl_ms),
            dedup: DedupEngine::new(config.dedup_capacity),
            roles,
            diagnostics: Arc::new(TracingDiagnostics),
            stats: IngressStats::default(),
            high_water_ms: None,
        }
    }

    pub fn with_tables(mut self, tables: RoutingTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn tables(&self) -> &RoutingTables {
        &self.tables
    }

    /// Run one envelope through the pipeline.
    ///
    /// Returns `None` when the envelope is discarded for any reason. Never
    /// fails: every problem degrades to a drop plus a diagnostics record.
    pub fn ingest(&mut self, envelope: IngressEnvelope) -> Option<RoutedDecision> {
        self.stats.received += 1;
        self.high_water_ms = Some(
            self.high_water_ms
                .map_or(envelope.received_at_ms, |seen| seen.max(envelope.received_at_ms)),
        );

        let classification = classify(&self.tables, &envelope);
        trace!(
            source = %envelope.source,
            raw_event = %envelope.raw_event_name,
            event_class = %classification.class,
            effective_event = %classification.effective_event,
            "Classified ingress envelope"
        );

        let Some(kind) = DecisionKind::from_class(classification.class) else {
            self.stats.unroutable += 1;
            debug!(
                source = %envelope.source,
                raw_event = %envelope.raw_event_name,
                "Dropping unroutable ingress event"
            );
            self.report(
                Stage::Canonicalize,
                Status::Dropped,
                "unroutable event",
                &envelope,
                &classification,
            );
            return None;
        };

        let role = self.roles.current_role();
        if !can_handle_broadcast_ingress(role.as_deref()) {
            self.stats.role_denied += 1;
            self.report(
                Stage::Admission,
                Status::Skipped,
                "role cannot handle broadcast ingress",
                &envelope,
                &classification,
            );
            return None;
        }

        if let Err(e) = envelope.validate() {
            self.stats.malformed += 1;
            self.report(
                Stage::Validate,
                Status::Dropped,
                &e.to_string(),
                &envelope,
                &classification,
            );
            return None;
        }

        let id = envelope.normalized_id.trim();
        let now_ms = envelope.received_at_ms;

        match classification.class {
            EventClass::Cancellation => {
                self.tombstones.add(id, now_ms);
            }
            EventClass::NewBroadcast if self.tombstones.has(id, now_ms) => {
                self.stats.suppressed += 1;
                self.report(
                    Stage::Tombstone,
                    Status::Suppressed,
                    "broadcast id recently cancelled",
                    &envelope,
                    &classification,
                );
                return None;
            }
            _ => {}
        }

        let key = dedup_key(classification.class, &envelope);
        if !self.dedup.insert_if_new(key) {
            self.stats.duplicates += 1;
            self.report(
                Stage::Dedup,
                Status::Duplicate,
                "already routed",
                &envelope,
                &classification,
            );
            return None;
        }

        self.stats.emitted += 1;
        self.report(
            Stage::Emit,
            Status::Emitted,
            "routed",
            &envelope,
            &classification,
        );

        Some(RoutedDecision {
            decision_id: Uuid::now_v7(),
            kind,
            broadcast_id: id.to_string(),
            source: envelope.source,
            effective_event: classification.effective_event,
            payload_version: envelope.payload_version,
            broadcast: envelope.broadcast,
            received_at_ms: envelope.received_at_ms,
        })
    }

    /// Drop tombstones expired relative to the latest envelope timestamp
    /// seen. Envelope time is the only clock tombstones are compared against,
    /// so periodic housekeeping must not use wall-clock time.
    pub fn purge_observed(&mut self) -> usize {
        match self.high_water_ms {
            Some(now_ms) => self.purge(now_ms),
            None => 0,
        }
    }

    /// Drop tombstones expired at `now_ms`. Returns how many were removed.
    pub fn purge(&mut self, now_ms: i64) -> usize {
        let purged = self.tombstones.purge_expired(now_ms);
        if purged > 0 {
            debug!(
                { logging::PURGED } = purged,
                remaining = self.tombstones.len(),
                "Purged expired tombstones"
            );
        }
        purged
    }

    /// Forget all tombstones, dedup keys and counters (session teardown).
    pub fn reset(&mut self) {
        self.tombstones.clear();
        self.dedup.clear();
        self.stats = IngressStats::default();
        self.high_water_ms = None;
        info!("Ingress coordinator state reset");
    }

    pub fn stats(&self) -> IngressStats {
        self.stats
    }

    /// Whether `id` is currently tombstoned at `now_ms`.
    pub fn is_tombstoned(&self, id: &str, now_ms: i64) -> bool {
        self.tombstones.has(id.trim(), now_ms)
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    pub fn dedup_len(&self) -> usize {
        self.dedup.len()
    }

    fn report(
        &self,
        stage: Stage,
        status: Status,
        reason: &str,
        envelope: &IngressEnvelope,
        classification: &Classification,
    ) {
        let record = DiagnosticRecord::new(stage, status, reason)
            .with_attr(ATTR_BROADCAST_ID, envelope.normalized_id.trim())
            .with_attr(ATTR_SOURCE, envelope.source)
            .with_attr(ATTR_RAW_EVENT, &envelope.raw_event_name)
            .with_attr(ATTR_EVENT_CLASS, classification.class)
            .with_attr(ATTR_EFFECTIVE_EVENT, &classification.effective_event);
        self.diagnostics.record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::policy::SessionRole;
    use cargolink_core::IngressSource;

    fn coordinator(role: Option<&str>) -> (IngressCoordinator, MemoryDiagnostics) {
        let diagnostics = MemoryDiagnostics::new();
        let coordinator = IngressCoordinator::new(
            &IngressConfig::default(),
            Arc::new(SessionRole::new(role)),
        )
        .with_diagnostics(Arc::new(diagnostics.clone()));
        (coordinator, diagnostics)
    }

    fn socket(name: &str, id: &str, at: i64) -> IngressEnvelope {
        IngressEnvelope::new(IngressSource::Socket, name, id, at)
    }

    fn push(name: &str, id: &str, at: i64) -> IngressEnvelope {
        IngressEnvelope::new(IngressSource::Push, name, id, at)
    }

    #[test]
    fn test_classify_direct_name() {
        let tables = RoutingTables::default();
        let c = classify(&tables, &socket(" New_Order_Alert ", "b-1", 0));
        assert_eq!(c.class, EventClass::NewBroadcast);
        assert_eq!(c.effective_event, "new_order_alert");
    }

    #[test]
    fn test_classify_carrier_with_cancellation_payload() {
        let tables = RoutingTables::default();
        let env = socket("message", "b-1", 0).with_payload_type("order_cancelled");
        let c = classify(&tables, &env);
        assert_eq!(c.class, EventClass::Cancellation);
        assert_eq!(c.effective_event, "order_cancelled");
    }

    #[test]
    fn test_classify_carrier_status_update_payload() {
        let tables = RoutingTables::default();
        let env = push("notification", "b-1", 0).with_payload_type("trucks_remaining_update");
        let c = classify(&tables, &env);
        assert_eq!(c.class, EventClass::StatusUpdate);
        assert_eq!(c.effective_event, "trucks_remaining_update");
    }

    #[test]
    fn test_classify_unknown_non_carrier_name_is_unroutable() {
        let tables = RoutingTables::default();
        // Not a carrier, so payload types are never inspected.
        let env = socket("driver_location", "b-1", 0).with_payload_type("new_broadcast");
        assert_eq!(classify(&tables, &env).class, EventClass::Unroutable);
    }

    #[test]
    fn test_alias_names_share_dedup_key() {
        let tables = RoutingTables::default();
        let a = socket("new_broadcast", "b-1", 0).with_version("7");
        let b = push("new_order_alert", "b-1", 5).with_version("7");
        let ka = dedup_key(classify(&tables, &a).class, &a);
        let kb = dedup_key(classify(&tables, &b).class, &b);
        assert_eq!(ka, kb);
    }

    #[test]
    fn test_dedup_key_trims_id_and_ignores_blank_version() {
        let env = socket("new_broadcast", " b-1 ", 0).with_version("  ");
        let key = dedup_key(EventClass::NewBroadcast, &env);
        assert_eq!(key, DedupKey::new(EventClass::NewBroadcast, "b-1", None));
    }

    #[test]
    fn test_identical_envelope_twice_routes_once() {
        let (mut c, diagnostics) = coordinator(Some("transporter"));
        let env = socket("new_broadcast", "b-1", 1_000).with_version("1");

        assert!(c.ingest(env.clone()).is_some());
        assert!(c.ingest(env).is_none());

        let stats = c.stats();
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(diagnostics.with_status(Status::Duplicate).len(), 1);
    }

    #[test]
    fn test_same_event_from_both_transports_routes_once() {
        let (mut c, _) = coordinator(Some("transporter"));
        let first = c.ingest(socket("new_broadcast", "b-1", 1_000));
        let second = c.ingest(push("", "b-1", 1_200).with_payload_type("new_order_alert"));
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_new_version_routes_again() {
        let (mut c, _) = coordinator(Some("transporter"));
        assert!(c.ingest(socket("new_broadcast", "b-1", 0).with_version("1")).is_some());
        assert!(c.ingest(socket("new_broadcast", "b-1", 10).with_version("2")).is_some());
    }

    #[test]
    fn test_cancellation_suppresses_late_broadcast() {
        let (mut c, diagnostics) = coordinator(Some("transporter"));

        let cancel = c.ingest(socket("order_cancelled", "b-1", 1_000)).unwrap();
        assert_eq!(cancel.kind, DecisionKind::Cancellation);

        // Push delivered the stale offer after the cancellation.
        let stale = push("", "b-1", 3_000).with_payload_type("new_broadcast");
        assert!(c.ingest(stale).is_none());
        assert_eq!(c.stats().suppressed, 1);

        let suppressed = diagnostics.with_status(Status::Suppressed);
        assert_eq!(suppressed.len(), 1);
        assert_eq!(suppressed[0].attr(ATTR_BROADCAST_ID), Some("b-1"));
    }

    #[test]
    fn test_broadcast_allowed_after_tombstone_expires() {
        let (mut c, _) = coordinator(Some("transporter"));
        c.ingest(socket("order_expired", "b-1", 1_000));
        assert!(c.ingest(socket("new_broadcast", "b-1", 61_000)).is_none());
        assert!(c.ingest(socket("new_broadcast", "b-1", 62_000)).is_some());
    }

    #[test]
    fn test_duplicate_cancellation_refreshes_tombstone_but_routes_once() {
        let (mut c, _) = coordinator(Some("transporter"));
        assert!(c.ingest(socket("booking_cancelled", "b-1", 0)).is_some());
        assert!(c.ingest(push("message", "b-1", 50_000).with_payload_type("order_cancelled")).is_none());
        assert!(c.is_tombstoned("b-1", 100_000));
    }

    #[test]
    fn test_status_update_ignores_tombstone() {
        let (mut c, _) = coordinator(Some("transporter"));
        c.ingest(socket("order_cancelled", "b-1", 0));
        let update = c.ingest(socket("trucks_remaining_update", "b-1", 10).with_version("4"));
        assert_eq!(update.unwrap().kind, DecisionKind::StatusUpdate);
    }

    #[test]
    fn test_unroutable_dropped() {
        let (mut c, diagnostics) = coordinator(Some("transporter"));
        assert!(c.ingest(socket("driver_location", "b-1", 0)).is_none());
        assert_eq!(c.stats().unroutable, 1);
        assert_eq!(diagnostics.records()[0].stage, Stage::Canonicalize);
    }

    #[test]
    fn test_role_denied_is_skipped() {
        let (mut c, diagnostics) = coordinator(Some("driver"));
        assert!(c.ingest(socket("new_broadcast", "b-1", 0)).is_none());
        assert_eq!(c.stats().role_denied, 1);
        let skipped = diagnostics.with_status(Status::Skipped);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].stage, Stage::Admission);
        // Nothing was remembered for a denied envelope.
        assert_eq!(c.dedup_len(), 0);
    }

    #[test]
    fn test_missing_id_is_malformed_not_fatal() {
        let (mut c, diagnostics) = coordinator(Some("transporter"));
        assert!(c.ingest(socket("order_cancelled", "  ", 0)).is_none());
        assert_eq!(c.stats().malformed, 1);
        assert_eq!(c.tombstone_count(), 0);
        assert_eq!(diagnostics.records()[0].stage, Stage::Validate);
        assert!(diagnostics.records()[0].reason.starts_with("Malformed envelope"));

        // The coordinator keeps working afterwards.
        assert!(c.ingest(socket("new_broadcast", "b-2", 0)).is_some());
    }

    #[test]
    fn test_decision_carries_effective_event_and_payload() {
        let (mut c, _) = coordinator(Some("transporter"));
        let decision = c
            .ingest(socket("message", "b-1", 42).with_payload_type("new_broadcast").with_version("9"))
            .unwrap();
        assert_eq!(decision.kind, DecisionKind::Broadcast);
        assert_eq!(decision.effective_event, "message");
        assert_eq!(decision.payload_version.as_deref(), Some("9"));
        assert_eq!(decision.received_at_ms, 42);
        assert_eq!(decision.source, IngressSource::Socket);
    }

    #[test]
    fn test_purge_observed_uses_envelope_clock() {
        let (mut c, _) = coordinator(Some("transporter"));
        assert_eq!(c.purge_observed(), 0);

        c.ingest(socket("order_cancelled", "b-1", 1_000));
        // Nothing newer than the cancellation has been seen yet.
        assert_eq!(c.purge_observed(), 0);
        assert!(c.ingest(socket("new_broadcast", "b-1", 6_000)).is_none());

        // An older, late envelope must not move the clock backwards.
        c.ingest(socket("broadcast_updated", "b-9", 500));
        assert_eq!(c.purge_observed(), 0);
        assert_eq!(c.tombstone_count(), 1);

        c.ingest(socket("new_broadcast", "b-2", 62_000));
        assert_eq!(c.purge_observed(), 1);
        assert_eq!(c.tombstone_count(), 0);
    }

    #[test]
    fn test_message_carrier_status_update_is_not_an_offer() {
        let (mut c, _) = coordinator(Some("transporter"));
        let env = push("message", "b-1", 0).with_payload_type("trucks_remaining_update");
        let class = classify(c.tables(), &env);
        assert_eq!(class.class, EventClass::StatusUpdate);
        assert_eq!(class.effective_event, "trucks_remaining_update");

        let decision = c.ingest(env.with_version("3")).unwrap();
        assert_eq!(decision.kind, DecisionKind::StatusUpdate);

        // Legacy field works too, and cancellation still outranks it.
        let legacy = push("message", "b-2", 0).with_legacy_payload_type("Booking_Updated");
        assert_eq!(classify(c.tables(), &legacy).class, EventClass::StatusUpdate);
        let mixed = push("message", "b-3", 0)
            .with_payload_type("broadcast_updated")
            .with_legacy_payload_type("order_cancelled");
        assert_eq!(classify(c.tables(), &mixed).class, EventClass::Cancellation);

        // A bare "message" is still a broadcast signal.
        let bare = push("message", "b-4", 0);
        assert_eq!(classify(c.tables(), &bare).class, EventClass::NewBroadcast);
    }

    #[test]
    fn test_purge_and_reset() {
        let (mut c, _) = coordinator(Some("transporter"));
        c.ingest(socket("order_cancelled", "b-1", 0));
        c.ingest(socket("order_cancelled", "b-2", 50_000));

        assert_eq!(c.purge(100_000), 1);
        assert_eq!(c.tombstone_count(), 1);

        c.reset();
        assert_eq!(c.tombstone_count(), 0);
        assert_eq!(c.dedup_len(), 0);
        assert_eq!(c.stats(), IngressStats::default());
    }
}
