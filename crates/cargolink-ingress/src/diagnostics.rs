//! Diagnostics records for admission and drop decisions.
//!
//! The coordinator reports every non-emitted outcome (and every emission) to
//! a [`DiagnosticsSink`]. Sinks are fire-and-forget: `record` must not block
//! ingestion.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use cargolink_core::logging;

/// Pipeline stage that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Canonicalize,
    Admission,
    Validate,
    Tombstone,
    Dedup,
    Emit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Canonicalize => "canonicalize",
            Stage::Admission => "admission",
            Stage::Validate => "validate",
            Stage::Tombstone => "tombstone",
            Stage::Dedup => "dedup",
            Stage::Emit => "emit",
        }
    }
}

/// Outcome at a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Emitted,
    /// Not for this role.
    Skipped,
    /// Unroutable or malformed.
    Dropped,
    Duplicate,
    /// Resurrection of a tombstoned id.
    Suppressed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Emitted => "emitted",
            Status::Skipped => "skipped",
            Status::Dropped => "dropped",
            Status::Duplicate => "duplicate",
            Status::Suppressed => "suppressed",
        }
    }
}

/// Structured diagnostics record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub stage: Stage,
    pub status: Status,
    pub reason: String,
    pub attributes: BTreeMap<String, String>,
}

impl DiagnosticRecord {
    pub fn new(stage: Stage, status: Status, reason: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            reason: reason.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Observability collaborator accepting diagnostics records.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, record: DiagnosticRecord);
}

/// Sink that writes records as structured `tracing` events.
///
/// Malformed envelopes log at WARN, everything else at DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        let attributes = serde_json::to_string(&record.attributes).unwrap_or_default();
        if record.stage == Stage::Validate {
            tracing::warn!(
                { logging::SUBSYSTEM } = "ingress",
                { logging::STAGE } = record.stage.as_str(),
                { logging::STATUS } = record.status.as_str(),
                { logging::REASON } = record.reason.as_str(),
                attributes = attributes.as_str(),
                "Ingress envelope rejected"
            );
        } else {
            tracing::debug!(
                { logging::SUBSYSTEM } = "ingress",
                { logging::STAGE } = record.stage.as_str(),
                { logging::STATUS } = record.status.as_str(),
                { logging::REASON } = record.reason.as_str(),
                attributes = attributes.as_str(),
                "Ingress decision"
            );
        }
    }
}

/// Sink that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnostics {
    records: Arc<Mutex<Vec<DiagnosticRecord>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Records with the given status.
    pub fn with_status(&self, status: Status) -> Vec<DiagnosticRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

/// Attribute key for the broadcast id, shared with log field names.
pub const ATTR_BROADCAST_ID: &str = logging::BROADCAST_ID;
/// Attribute key for the transport.
pub const ATTR_SOURCE: &str = logging::SOURCE;
/// Attribute key for the raw event name.
pub const ATTR_RAW_EVENT: &str = logging::RAW_EVENT;
/// Attribute key for the canonical class.
pub const ATTR_EVENT_CLASS: &str = logging::EVENT_CLASS;
/// Attribute key for the effective event discriminator.
pub const ATTR_EFFECTIVE_EVENT: &str = logging::EFFECTIVE_EVENT;
