//! # cargolink-ingress
//!
//! Broadcast ingress coordination for cargolink.
//!
//! Job offers ("new broadcast") and their cancellations reach the client
//! over two unreliable transports: a persistent socket and push
//! notifications. Both deliver at-least-once and in no particular order
//! relative to each other. This crate provides:
//! - Canonicalization of raw event names and payload types into event classes
//! - Fallback routing for events delivered under generic carrier names
//! - Role admission and notification type predicates for presentation code
//! - Deduplication and tombstone-based suppression of stale offers
//! - A single-consumer worker that both transports feed
//! - The ordered logout contract
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cargolink_ingress::{IngressConfig, IngressCoordinator, IngressWorker, SessionRole};
//!
//! let config = IngressConfig::from_env();
//! let role = SessionRole::new(Some("transporter"));
//! let coordinator = IngressCoordinator::new(&config, Arc::new(role.clone()));
//!
//! // One handle per transport; both feed the same worker.
//! let handle = IngressWorker::new(coordinator, config).start();
//! let push_handle = handle.clone();
//!
//! let mut decisions = handle.decisions();
//! while let Ok(decision) = decisions.recv().await {
//!     println!("{:?} {}", decision.kind, decision.broadcast_id);
//! }
//! ```

pub mod canonical;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod diagnostics;
pub mod logout;
pub mod policy;
pub mod resolver;
pub mod tombstone;
pub mod worker;

// Re-export core types
pub use cargolink_core::*;

pub use canonical::{canonicalize, canonicalize_with, normalize};
pub use classifier::is_cancellation_or_expiry_type;
pub use config::{IngressConfig, RoutingTables};
pub use coordinator::{classify, dedup_key, Classification, IngressCoordinator, IngressStats};
pub use dedup::DedupEngine;
pub use diagnostics::{
    DiagnosticRecord, DiagnosticsSink, MemoryDiagnostics, Stage, Status, TracingDiagnostics,
};
pub use logout::{
    execute_logout_contract, LogoutActions, LogoutReport, LogoutStep, LogoutSteps, StepOutcome,
};
pub use policy::{
    can_display_notification, can_display_notification_with, can_handle_broadcast_ingress,
    RoleProvider, SessionRole,
};
pub use resolver::{resolve, FallbackDecision, FallbackRoute};
pub use tombstone::TombstoneStore;
pub use worker::{now_ms, IngressHandle, IngressWorker};
