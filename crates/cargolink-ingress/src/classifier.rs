//! Notification type classification.

use cargolink_core::defaults::CANCELLATION_OR_EXPIRY_TYPES;

use crate::canonical::normalize;

/// Whether a notification type means "this job is gone" (cancelled,
/// dismissed, or expired). Exact alias match after normalization.
pub fn is_cancellation_or_expiry_type(notification_type: &str) -> bool {
    let ty = normalize(notification_type);
    CANCELLATION_OR_EXPIRY_TYPES.contains(&ty.as_str())
}
