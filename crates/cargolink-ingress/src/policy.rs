//! Role admission policy.
//!
//! Broadcast ingress, and every notification type that belongs to the
//! broadcast flow, is reserved for the fleet-operator (transporter) role.
//! Other notification types, such as trip assignments, are addressed to
//! their recipient upstream and are displayable for any role.

use std::sync::{Arc, RwLock};

use cargolink_core::defaults::ROLE_TRANSPORTER;
use cargolink_core::EventClass;

use crate::canonical::{canonicalize, canonicalize_with};
use crate::config::RoutingTables;

/// Whether the role may receive broadcast ingress at all.
pub fn can_handle_broadcast_ingress(role: Option<&str>) -> bool {
    role.map(|r| r.trim().eq_ignore_ascii_case(ROLE_TRANSPORTER))
        .unwrap_or(false)
}

/// Whether a system notification of `notification_type` may surface for `role`.
///
/// Judged against the shipped alias tables. Clients that register extra
/// aliases on their coordinator should use [`can_display_notification_with`].
pub fn can_display_notification(role: Option<&str>, notification_type: &str) -> bool {
    if is_broadcast_notification_type(notification_type) {
        can_handle_broadcast_ingress(role)
    } else {
        true
    }
}

/// [`can_display_notification`] against custom routing tables.
pub fn can_display_notification_with(
    tables: &RoutingTables,
    role: Option<&str>,
    notification_type: &str,
) -> bool {
    if canonicalize_with(tables, notification_type).is_routable() {
        can_handle_broadcast_ingress(role)
    } else {
        true
    }
}

/// Notification types that belong to the broadcast flow: offers,
/// cancellations/expiries, and offer updates.
pub fn is_broadcast_notification_type(notification_type: &str) -> bool {
    canonicalize(notification_type) != EventClass::Unroutable
}

/// Source of the current user's role.
pub trait RoleProvider: Send + Sync {
    /// Current role string, `None` when signed out or unknown.
    fn current_role(&self) -> Option<String>;
}

/// Role provider backed by a swappable in-memory value.
///
/// Session code updates it on login/logout; the coordinator reads it per
/// envelope.
#[derive(Debug, Clone, Default)]
pub struct SessionRole {
    role: Arc<RwLock<Option<String>>>,
}

impl SessionRole {
    pub fn new(role: Option<&str>) -> Self {
        Self {
            role: Arc::new(RwLock::new(role.map(String::from))),
        }
    }

    pub fn set(&self, role: Option<&str>) {
        // A poisoned lock still holds a usable value.
        let mut guard = self.role.write().unwrap_or_else(|e| e.into_inner());
        *guard = role.map(String::from);
    }
}

impl RoleProvider for SessionRole {
    fn current_role(&self) -> Option<String> {
        self.role
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
