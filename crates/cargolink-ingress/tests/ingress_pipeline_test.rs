//! Integration tests for the ingress pipeline.
//!
//! This test suite validates:
//! - Pipeline-001: Socket and push deliveries of one offer emit a single decision
//! - Pipeline-002: Raw push payloads (nested `data`, numeric ids) are normalized
//! - Pipeline-003: A cancellation suppresses a late re-delivery of the same offer
//! - Pipeline-004: Cancellations route on carrier names via payload types
//! - Pipeline-005: Non-transporter roles never see broadcast decisions
//! - Pipeline-006: A version bump re-emits an already routed offer
//! - Pipeline-007: Logout clears ingress state through the worker handle

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cargolink_ingress::{
    can_display_notification, can_handle_broadcast_ingress, execute_logout_contract,
    DecisionKind, Error, IngressConfig, IngressCoordinator, IngressEnvelope, IngressHandle,
    IngressSource, IngressWorker, LogoutStep, LogoutSteps, MemoryDiagnostics, RawIngress,
    RoutedDecision, SessionRole, Status,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::timeout;

fn start_worker(role: &SessionRole) -> IngressHandle {
    let config = IngressConfig::default();
    let coordinator = IngressCoordinator::new(&config, Arc::new(role.clone()));
    IngressWorker::new(coordinator, config).start()
}

/// Drain every decision currently published, waiting briefly for stragglers.
async fn drain(rx: &mut broadcast::Receiver<RoutedDecision>) -> Vec<RoutedDecision> {
    let mut out = Vec::new();
    while let Ok(Ok(decision)) = timeout(Duration::from_millis(50), rx.recv()).await {
        out.push(decision);
    }
    out
}

#[tokio::test]
async fn test_socket_and_push_collapse_to_one_decision() {
    let role = SessionRole::new(Some("transporter"));
    let socket = start_worker(&role);
    let push = socket.clone();
    let mut decisions = socket.decisions();

    let from_socket = tokio::spawn(async move {
        for _ in 0..5 {
            socket
                .submit(IngressEnvelope::new(IngressSource::Socket, "new_broadcast", "b-42", 1_000))
                .await
                .unwrap();
        }
        socket
    });
    let from_push = tokio::spawn(async move {
        for _ in 0..5 {
            push.submit(IngressEnvelope::new(IngressSource::Push, "new_order_alert", " b-42 ", 1_001))
                .await
                .unwrap();
        }
    });

    let handle = from_socket.await.unwrap();
    from_push.await.unwrap();

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.received, 10);
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.duplicates, 9);

    let routed = drain(&mut decisions).await;
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].broadcast_id, "b-42");
    assert_eq!(routed[0].kind, DecisionKind::Broadcast);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_raw_push_payload_is_normalized() {
    let role = SessionRole::new(Some("transporter"));
    let handle = start_worker(&role);
    let mut decisions = handle.decisions();

    let payload = json!({
        "data": {
            "type": "new_booking_request",
            "orderId": 9001,
            "pickupAddress": "Dock 4",
            "dropAddress": "Warehouse 12",
            "vehicleType": "open_truck",
            "trucksNeeded": 3
        }
    });
    handle
        .submit_raw(RawIngress::new(IngressSource::Push, "", payload, 5_000))
        .await
        .unwrap();

    let routed = drain(&mut decisions).await;
    assert_eq!(routed.len(), 1);
    let decision = &routed[0];
    assert_eq!(decision.broadcast_id, "9001");
    assert_eq!(decision.source, IngressSource::Push);
    assert_eq!(decision.effective_event, "new_booking_request");
    let broadcast = decision.broadcast.as_ref().unwrap();
    assert_eq!(broadcast.pickup_address, "Dock 4");
    assert_eq!(broadcast.trucks_needed, Some(3));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_suppresses_resurrection() {
    let role = SessionRole::new(Some("transporter"));
    let handle = start_worker(&role);
    let mut decisions = handle.decisions();

    handle
        .submit(IngressEnvelope::new(IngressSource::Socket, "order_cancelled", "b-7", 1_000))
        .await
        .unwrap();
    // A stale push delivery of the original offer arrives after the cancel.
    handle
        .submit(IngressEnvelope::new(IngressSource::Push, "new_broadcast", "b-7", 1_500))
        .await
        .unwrap();

    let routed = drain(&mut decisions).await;
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].kind, DecisionKind::Cancellation);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.suppressed, 1);

    // Once the tombstone expires the id may be offered again.
    handle
        .submit(IngressEnvelope::new(IngressSource::Socket, "new_broadcast", "b-7", 62_000))
        .await
        .unwrap();
    let routed = drain(&mut decisions).await;
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].kind, DecisionKind::Broadcast);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_on_carrier_name() {
    let role = SessionRole::new(Some("transporter"));
    let diagnostics = MemoryDiagnostics::new();
    let config = IngressConfig::default();
    let mut coordinator = IngressCoordinator::new(&config, Arc::new(role))
        .with_diagnostics(Arc::new(diagnostics.clone()));

    // "message" alone would be a broadcast signal; the payload type wins.
    let env = IngressEnvelope::new(IngressSource::Push, "message", "b-3", 2_000)
        .with_legacy_payload_type("BOOKING_EXPIRED");
    let decision = coordinator.ingest(env).unwrap();
    assert_eq!(decision.kind, DecisionKind::Cancellation);
    assert_eq!(decision.effective_event, "booking_expired");
    assert!(coordinator.is_tombstoned("b-3", 2_000));

    let plain = IngressEnvelope::new(IngressSource::Push, "message", "b-4", 2_000);
    let decision = coordinator.ingest(plain).unwrap();
    assert_eq!(decision.kind, DecisionKind::Broadcast);
    assert_eq!(decision.effective_event, "message");

    assert_eq!(diagnostics.with_status(Status::Emitted).len(), 2);
}

#[tokio::test]
async fn test_roles_without_broadcast_ingress() {
    for role in [None, Some(""), Some("customer"), Some("driver")] {
        assert!(!can_handle_broadcast_ingress(role));
        assert!(!can_display_notification(role, "new_broadcast"));
        assert!(!can_display_notification(role, "order_cancelled"));
        assert!(can_display_notification(role, "payment_received"));
    }
    assert!(can_handle_broadcast_ingress(Some("transporter")));
    assert!(can_display_notification(Some("transporter"), "new_order_alert"));

    let role = SessionRole::new(Some("customer"));
    let handle = start_worker(&role);
    let mut decisions = handle.decisions();

    handle
        .submit(IngressEnvelope::new(IngressSource::Socket, "new_broadcast", "b-1", 0))
        .await
        .unwrap();
    assert!(drain(&mut decisions).await.is_empty());
    assert_eq!(handle.stats().await.unwrap().role_denied, 1);

    // Role switches take effect for the next envelope.
    role.set(Some("transporter"));
    handle
        .submit(IngressEnvelope::new(IngressSource::Socket, "new_broadcast", "b-1", 0))
        .await
        .unwrap();
    assert_eq!(drain(&mut decisions).await.len(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_version_bump_reemits() {
    let role = SessionRole::new(Some("transporter"));
    let handle = start_worker(&role);
    let mut decisions = handle.decisions();

    for version in ["1", "1", "2"] {
        handle
            .submit(
                IngressEnvelope::new(IngressSource::Socket, "broadcast_updated", "b-5", 0)
                    .with_version(version),
            )
            .await
            .unwrap();
    }

    let routed = drain(&mut decisions).await;
    let versions: Vec<_> = routed
        .iter()
        .map(|d| d.payload_version.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(versions, vec!["1", "2"]);
    assert!(routed.iter().all(|d| d.kind == DecisionKind::StatusUpdate));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_logout_resets_ingress_state() {
    let role = SessionRole::new(Some("transporter"));
    let handle = start_worker(&role);

    handle
        .submit(IngressEnvelope::new(IngressSource::Socket, "order_cancelled", "b-8", 0))
        .await
        .unwrap();
    assert_eq!(handle.stats().await.unwrap().emitted, 1);

    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let unregister_order = order.clone();
    let clear_order = order.clone();
    let clear_handle = handle.clone();
    let clear_role = role.clone();

    let steps = LogoutSteps::new()
        .on_unregister_push_token(move || {
            let order = unregister_order.clone();
            async move {
                order.lock().unwrap().push("unregister");
                Ok::<(), Error>(())
            }
        })
        .on_stop_and_clear_local_session(move || {
            let order = clear_order.clone();
            let handle = clear_handle.clone();
            let role = clear_role.clone();
            async move {
                handle.reset().await?;
                role.set(None);
                order.lock().unwrap().push("local_clear");
                Ok::<(), Error>(())
            }
        });

    let report = execute_logout_contract(false, &steps).await;
    assert!(report.is_clean());
    assert_eq!(
        report.steps(),
        vec![LogoutStep::UnregisterPushToken, LogoutStep::ClearLocalSession]
    );
    assert_eq!(*order.lock().unwrap(), vec!["unregister", "local_clear"]);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.received, 0);
    assert_eq!(stats.emitted, 0);

    handle.shutdown().await.unwrap();
}
