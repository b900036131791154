//! Structured logging schema, field name constants, and subscriber setup.
//!
//! All crates use these constants for consistent structured logging fields,
//! as `{ logging::STAGE } = value` in `tracing` macros,
//! so ingress drops and admissions can be queried by the same field names
//! regardless of which component emitted them.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (malformed envelope, failed logout step, full queue) |
//! | INFO  | Lifecycle events (worker start/stop, logout, session reset) |
//! | DEBUG | Decision points (unroutable, duplicate, suppressed, emitted) |
//! | TRACE | Per-envelope intermediate values (normalized names, keys) |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{Error, Result};

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "ingress", "session"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "coordinator", "resolver", "worker", "logout"
pub const COMPONENT: &str = "component";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Normalized broadcast/order id.
pub const BROADCAST_ID: &str = "broadcast_id";

/// Canonical event class.
pub const EVENT_CLASS: &str = "event_class";

/// Transport that delivered the envelope ("socket", "push").
pub const SOURCE: &str = "source";

/// Raw transport event name as received.
pub const RAW_EVENT: &str = "raw_event";

/// Discriminator actually used downstream (raw name or payload type).
pub const EFFECTIVE_EVENT: &str = "effective_event";

// ─── Diagnostic fields ─────────────────────────────────────────────────────

/// Pipeline stage that produced a decision.
/// Values: "canonicalize", "admission", "validate", "tombstone", "dedup", "emit"
pub const STAGE: &str = "stage";

/// Outcome of the stage.
/// Values: "emitted", "skipped", "dropped", "duplicate", "suppressed"
pub const STATUS: &str = "status";

/// Human-readable reason for a non-emitted outcome.
pub const REASON: &str = "reason";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of entries removed by a purge.
pub const PURGED: &str = "purged";


// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Install a global `tracing` subscriber configured from the environment.
///
///   LOG_FORMAT  - "text" (default) or "json"
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "cargolink_ingress=info")
///
/// Returns an error instead of panicking when a global subscriber is already
/// installed, so embedding clients and tests can call it unconditionally.
pub fn init_tracing() -> Result<()> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cargolink_ingress=info,cargolink_core=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        let mut layer = tracing_subscriber::fmt::layer();
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).try_init()
    };

    result.map_err(|e| Error::Config(format!("tracing subscriber: {e}")))?;
    tracing::info!(log_format = %log_format, "Logging initialized");
    Ok(())
}
