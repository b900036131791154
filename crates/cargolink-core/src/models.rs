//! Data model for the broadcast ingress layer.
//!
//! Transports hand the core a [`RawIngress`]; it is normalized into an
//! [`IngressEnvelope`], classified into an [`EventClass`], fingerprinted as a
//! [`DedupKey`] and, if admitted, surfaces as a [`RoutedDecision`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::{Error, Result};

// ============================================================================
// Source and class
// ============================================================================

/// Transport that delivered an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressSource {
    /// Persistent push-socket channel.
    Socket,
    /// Best-effort push-notification channel.
    Push,
}

impl IngressSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngressSource::Socket => "socket",
            IngressSource::Push => "push",
        }
    }
}

impl std::fmt::Display for IngressSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical semantic class of an ingress event.
///
/// Many raw event names and payload types are aliases of one class; see
/// [`defaults::NEW_BROADCAST_ALIASES`] and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    /// A new job offer is available.
    NewBroadcast,
    /// A job offer was cancelled, dismissed, or expired.
    Cancellation,
    /// An open job offer changed (e.g. trucks remaining).
    StatusUpdate,
    /// Irrelevant or unrecognized; never routed.
    Unroutable,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventClass::NewBroadcast => "new_broadcast",
            EventClass::Cancellation => "cancellation",
            EventClass::StatusUpdate => "status_update",
            EventClass::Unroutable => "unroutable",
        }
    }

    /// Whether envelopes of this class can ever produce a decision.
    pub fn is_routable(&self) -> bool {
        !matches!(self, EventClass::Unroutable)
    }
}

impl std::fmt::Display for EventClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Fully-parsed job offer payload.
///
/// Push deliveries frequently carry only identifiers, so this is optional on
/// the envelope. Accepts both camelCase and snake_case field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastPayload {
    #[serde(alias = "pickup_address")]
    pub pickup_address: String,
    #[serde(alias = "drop_address")]
    pub drop_address: String,
    #[serde(alias = "vehicle_type")]
    pub vehicle_type: String,
    #[serde(default, alias = "customer_name")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, alias = "trucks_needed")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trucks_needed: Option<u32>,
    #[serde(default, alias = "trucks_remaining")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trucks_remaining: Option<u32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fare: Option<f64>,
    #[serde(default, alias = "expires_at")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// An event exactly as a transport observed it.
#[derive(Debug, Clone)]
pub struct RawIngress {
    pub source: IngressSource,
    /// Socket event name, or the push channel/collapse key (often empty).
    pub event_name: String,
    /// Decoded JSON body; `Null` when the transport delivered no body.
    pub payload: JsonValue,
    pub received_at_ms: i64,
}

impl RawIngress {
    pub fn new(
        source: IngressSource,
        event_name: impl Into<String>,
        payload: JsonValue,
        received_at_ms: i64,
    ) -> Self {
        Self {
            source,
            event_name: event_name.into(),
            payload,
            received_at_ms,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// One observed ingress event, independent of the transport that carried it.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressEnvelope {
    pub source: IngressSource,
    /// Transport-level event name; matched case- and whitespace-insensitively.
    pub raw_event_name: String,
    /// Broadcast/order id. Blank means unresolved; such envelopes are dropped
    /// before dedup and tombstone handling.
    pub normalized_id: String,
    pub received_at_ms: i64,
    /// Opaque payload revision token.
    pub payload_version: Option<String>,
    /// Primary payload type field (e.g. `"order_cancelled"`).
    pub payload_type: Option<String>,
    /// Legacy payload type field, consulted after the primary one.
    pub legacy_payload_type: Option<String>,
    pub broadcast: Option<BroadcastPayload>,
}

impl IngressEnvelope {
    pub fn new(
        source: IngressSource,
        raw_event_name: impl Into<String>,
        normalized_id: impl Into<String>,
        received_at_ms: i64,
    ) -> Self {
        Self {
            source,
            raw_event_name: raw_event_name.into(),
            normalized_id: normalized_id.into(),
            received_at_ms,
            payload_version: None,
            payload_type: None,
            legacy_payload_type: None,
            broadcast: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.payload_version = Some(version.into());
        self
    }

    pub fn with_payload_type(mut self, payload_type: impl Into<String>) -> Self {
        self.payload_type = Some(payload_type.into());
        self
    }

    pub fn with_legacy_payload_type(mut self, legacy: impl Into<String>) -> Self {
        self.legacy_payload_type = Some(legacy.into());
        self
    }

    pub fn with_broadcast(mut self, broadcast: BroadcastPayload) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Normalize a raw transport event into an envelope.
    ///
    /// Never fails: an unresolvable id leaves `normalized_id` blank and the
    /// coordinator drops the envelope with a diagnostic. Fields are looked up
    /// in the precedence order of [`defaults::ID_FIELDS`],
    /// [`defaults::PAYLOAD_TYPE_FIELDS`], [`defaults::LEGACY_TYPE_FIELDS`] and
    /// [`defaults::VERSION_FIELDS`]. A nested `data` object is consulted after
    /// the top level, since push deliveries wrap their body in it.
    pub fn from_raw(raw: RawIngress) -> Self {
        let body = PayloadView::new(&raw.payload);

        let normalized_id = body.first_non_blank(defaults::ID_FIELDS).unwrap_or_default();
        let payload_type = body.first_non_blank(defaults::PAYLOAD_TYPE_FIELDS);
        let legacy_payload_type = body.first_non_blank(defaults::LEGACY_TYPE_FIELDS);
        let payload_version = body.first_non_blank(defaults::VERSION_FIELDS);
        let broadcast = body.broadcast();

        Self {
            source: raw.source,
            raw_event_name: raw.event_name,
            normalized_id,
            received_at_ms: raw.received_at_ms,
            payload_version,
            payload_type,
            legacy_payload_type,
            broadcast,
        }
    }

    /// Whether the id resolved to something usable.
    pub fn has_id(&self) -> bool {
        !self.normalized_id.trim().is_empty()
    }

    /// Check the envelope can be keyed for dedup and tombstones.
    pub fn validate(&self) -> Result<()> {
        if !self.has_id() {
            return Err(Error::MalformedEnvelope(format!(
                "unresolvable broadcast id ({} event {:?})",
                self.source, self.raw_event_name
            )));
        }
        Ok(())
    }
}

/// Pick the first candidate that is present and non-blank, trimmed.
pub fn first_non_blank<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Read-only view over a JSON payload and its optional nested `data` object.
struct PayloadView<'a> {
    layers: Vec<&'a serde_json::Map<String, JsonValue>>,
}

impl<'a> PayloadView<'a> {
    fn new(payload: &'a JsonValue) -> Self {
        let mut layers = Vec::with_capacity(2);
        if let Some(top) = payload.as_object() {
            layers.push(top);
            if let Some(nested) = top.get("data").and_then(JsonValue::as_object) {
                layers.push(nested);
            }
        }
        Self { layers }
    }

    /// First non-blank value among `fields`, top level before nested.
    /// Numbers are accepted and rendered as strings (numeric order ids).
    fn first_non_blank(&self, fields: &[&str]) -> Option<String> {
        self.layers.iter().find_map(|layer| {
            let rendered: Vec<Option<String>> = fields
                .iter()
                .map(|field| match layer.get(*field) {
                    Some(JsonValue::String(s)) => Some(s.clone()),
                    Some(JsonValue::Number(n)) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            first_non_blank(rendered.iter().map(Option::as_deref))
        })
    }

    fn broadcast(&self) -> Option<BroadcastPayload> {
        self.layers.iter().find_map(|layer| {
            serde_json::from_value(JsonValue::Object((*layer).clone())).ok()
        })
    }
}

// ============================================================================
// Dedup key and decisions
// ============================================================================

/// Fingerprint of one logical ingress event.
///
/// Built from the canonical class, never the raw name, so the same event
/// delivered under different names by different transports collapses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub class: EventClass,
    pub id: String,
    /// Payload revision; `None` when the transport sent no revision token.
    pub version: Option<String>,
}

impl DedupKey {
    pub fn new(class: EventClass, id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            class,
            id: id.into(),
            version,
        }
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.class,
            self.id,
            self.version.as_deref().unwrap_or("-")
        )
    }
}

/// What presentation should do with an admitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Show (or refresh) the job offer.
    Broadcast,
    /// Withdraw the job offer.
    Cancellation,
    /// Update an offer already on screen.
    StatusUpdate,
}

impl DecisionKind {
    /// Map a routable class to its decision; `None` for unroutable.
    pub fn from_class(class: EventClass) -> Option<Self> {
        match class {
            EventClass::NewBroadcast => Some(DecisionKind::Broadcast),
            EventClass::Cancellation => Some(DecisionKind::Cancellation),
            EventClass::StatusUpdate => Some(DecisionKind::StatusUpdate),
            EventClass::Unroutable => None,
        }
    }
}

/// A single downstream decision per unique ingress event.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedDecision {
    /// UUIDv7, time-ordered.
    pub decision_id: Uuid,
    pub kind: DecisionKind,
    pub broadcast_id: String,
    pub source: IngressSource,
    /// Raw event name for direct and name-fallback matches, payload type for
    /// payload-fallback matches.
    pub effective_event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<BroadcastPayload>,
    pub received_at_ms: i64,
}
