//! Event canonicalization: raw transport names to [`EventClass`].

use cargolink_core::defaults;
use cargolink_core::EventClass;

use crate::config::RoutingTables;

/// Trim surrounding whitespace and lowercase.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Map a raw event name or payload type to its class using the shipped
/// alias tables. Unknown names are [`EventClass::Unroutable`].
pub fn canonicalize(raw: &str) -> EventClass {
    let name = normalize(raw);
    if defaults::NEW_BROADCAST_ALIASES.contains(&name.as_str()) {
        EventClass::NewBroadcast
    } else if defaults::CANCELLATION_ALIASES.contains(&name.as_str()) {
        EventClass::Cancellation
    } else if defaults::STATUS_UPDATE_ALIASES.contains(&name.as_str()) {
        EventClass::StatusUpdate
    } else {
        EventClass::Unroutable
    }
}

/// Like [`canonicalize`], against caller-provided tables.
pub fn canonicalize_with(tables: &RoutingTables, raw: &str) -> EventClass {
    let name = normalize(raw);
    if tables.broadcast_aliases.contains(&name) {
        EventClass::NewBroadcast
    } else if tables.cancellation_aliases.contains(&name) {
        EventClass::Cancellation
    } else if tables.status_update_aliases.contains(&name) {
        EventClass::StatusUpdate
    } else {
        EventClass::Unroutable
    }
}

/// Whether `raw` is a carrier name that says nothing about its contents.
pub fn is_generic_carrier(tables: &RoutingTables, raw: &str) -> bool {
    tables.generic_carrier_names.contains(&normalize(raw))
}
