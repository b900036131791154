//! Fallback routing for events delivered under a generic carrier name.
//!
//! A bare `"message"` socket event or a push notification without a useful
//! channel name only reveals its intent through the payload's type fields.
//! Precedence is fixed:
//!
//! 1. Raw names owned by a dedicated handler are never routed here.
//! 2. Cancellation payload types (primary, then legacy) win over everything,
//!    so a carrier event signalling cancellation is never shown as an offer.
//! 3. Broadcast signals: fallback carrier name, then primary payload type,
//!    then legacy payload type.

use cargolink_core::EventClass;

use crate::canonical::normalize;
use crate::config::RoutingTables;

/// Route recovered by the fallback resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRoute {
    /// Not routable through the fallback path.
    Unrouted,
    Cancellation,
    Broadcast,
}

impl FallbackRoute {
    pub fn event_class(&self) -> EventClass {
        match self {
            FallbackRoute::Unrouted => EventClass::Unroutable,
            FallbackRoute::Cancellation => EventClass::Cancellation,
            FallbackRoute::Broadcast => EventClass::NewBroadcast,
        }
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackDecision {
    pub route: FallbackRoute,
    /// The normalized string that produced the match: the raw event name for
    /// name matches, the payload type for payload matches.
    pub effective_event: Option<String>,
}

impl FallbackDecision {
    pub fn unrouted() -> Self {
        Self {
            route: FallbackRoute::Unrouted,
            effective_event: None,
        }
    }

    fn matched(route: FallbackRoute, effective_event: String) -> Self {
        Self {
            route,
            effective_event: Some(effective_event),
        }
    }
}

/// Recover the semantic route of a carrier event from its payload types.
pub fn resolve(
    raw_incoming_event: &str,
    payload_type: Option<&str>,
    legacy_payload_type: Option<&str>,
    tables: &RoutingTables,
) -> FallbackDecision {
    let raw = normalize(raw_incoming_event);
    let primary = payload_type.map(normalize).filter(|s| !s.is_empty());
    let legacy = legacy_payload_type.map(normalize).filter(|s| !s.is_empty());

    if tables.direct_broadcast_names.contains(&raw)
        || tables.direct_cancellation_names.contains(&raw)
    {
        return FallbackDecision::unrouted();
    }

    for candidate in [&primary, &legacy].into_iter().flatten() {
        if tables.cancellation_payload_types.contains(candidate) {
            return FallbackDecision::matched(FallbackRoute::Cancellation, candidate.clone());
        }
    }

    if tables.fallback_broadcast_names.contains(&raw) {
        return FallbackDecision::matched(FallbackRoute::Broadcast, raw);
    }

    for candidate in [&primary, &legacy].into_iter().flatten() {
        if tables.broadcast_payload_types.contains(candidate) {
            return FallbackDecision::matched(FallbackRoute::Broadcast, candidate.clone());
        }
    }

    FallbackDecision::unrouted()
}
