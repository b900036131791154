//! Centralized default constants for the cargolink ingress layer.
//!
//! **This module is the single source of truth** for shared default values
//! and alias tables. Other modules reference these constants instead of
//! defining their own magic numbers or string literals.

// =============================================================================
// TOMBSTONES
// =============================================================================

/// Window during which a cancelled/expired broadcast id suppresses late
/// "new broadcast" events for the same id.
///
/// A lookup matches while `now - created <= TOMBSTONE_TTL_MS`, so a lookup
/// exactly 60 s after creation still matches and one at 61 s does not.
pub const TOMBSTONE_TTL_MS: i64 = 60_000;

/// How often the ingress worker purges expired tombstones.
pub const TOMBSTONE_PURGE_INTERVAL_MS: u64 = 30_000;

// =============================================================================
// DEDUPLICATION
// =============================================================================

/// Maximum number of dedup keys remembered before the oldest are evicted.
pub const DEDUP_CAPACITY: usize = 4096;

// =============================================================================
// QUEUES
// =============================================================================

/// Bounded capacity of the ingestion queue shared by both transports.
pub const INGRESS_QUEUE_CAPACITY: usize = 256;

/// Default decision bus broadcast channel capacity.
pub const DECISION_BUS_CAPACITY: usize = 256;

// =============================================================================
// ROLES
// =============================================================================

/// Fleet-operator role, the only role that receives broadcast ingress.
pub const ROLE_TRANSPORTER: &str = "transporter";

// =============================================================================
// EVENT NAME ALIASES
// =============================================================================

/// Raw names and payload types meaning "a new job is available".
pub const NEW_BROADCAST_ALIASES: &[&str] = &[
    "new_broadcast",
    "new_order_alert",
    "broadcast_available",
    "new_booking_request",
    "new_truck_request",
];

/// Raw names and payload types meaning "job cancelled or expired".
///
/// The first six are the notification types presentation code treats as
/// cancellation/expiry; `broadcast_cancelled` is a socket-only event name.
pub const CANCELLATION_ALIASES: &[&str] = &[
    "order_cancelled",
    "booking_cancelled",
    "broadcast_dismissed",
    "order_expired",
    "booking_expired",
    "broadcast_expired",
    "broadcast_cancelled",
];

/// Notification types recognized as cancellation or expiry.
pub const CANCELLATION_OR_EXPIRY_TYPES: &[&str] = &[
    "order_cancelled",
    "booking_cancelled",
    "broadcast_dismissed",
    "order_expired",
    "booking_expired",
    "broadcast_expired",
];

/// Raw names and payload types meaning "an open job changed".
pub const STATUS_UPDATE_ALIASES: &[&str] = &[
    "broadcast_updated",
    "order_status_update",
    "booking_updated",
    "trucks_remaining_update",
];

/// Generic carrier names that say nothing about the event they carry.
///
/// The empty name covers push deliveries that arrive without a channel name.
pub const GENERIC_CARRIER_NAMES: &[&str] = &["", "message", "notification", "data_message"];

/// Carrier names whose mere arrival is treated as a broadcast signal once
/// cancellation payload types have been ruled out.
pub const FALLBACK_BROADCAST_NAMES: &[&str] = &["message"];

// =============================================================================
// PAYLOAD FIELDS
// =============================================================================

/// Payload fields holding the broadcast id, in precedence order.
pub const ID_FIELDS: &[&str] = &[
    "broadcastId",
    "broadcast_id",
    "orderId",
    "order_id",
    "bookingId",
    "booking_id",
];

/// Payload fields holding the primary payload type, in precedence order.
pub const PAYLOAD_TYPE_FIELDS: &[&str] = &["type", "notificationType", "notification_type"];

/// Payload fields holding the legacy payload type, in precedence order.
pub const LEGACY_TYPE_FIELDS: &[&str] = &["event", "action"];

/// Payload fields holding the payload revision, in precedence order.
pub const VERSION_FIELDS: &[&str] = &["version", "updatedAt", "updated_at"];
