//! Ingress configuration and routing tables.

use std::collections::HashSet;

use cargolink_core::defaults;
use cargolink_core::{Error, Result};

use crate::canonical::normalize;

/// Configuration for the ingress coordinator and its worker.
#[derive(Debug, Clone)]
pub struct IngressConfig {
    /// Tombstone window in milliseconds.
    pub tombstone_ttl_ms: i64,
    /// Maximum remembered dedup keys.
    pub dedup_capacity: usize,
    /// Bounded ingestion queue capacity.
    pub queue_capacity: usize,
    /// Decision bus buffer capacity.
    pub decision_bus_capacity: usize,
    /// Tombstone purge cadence in milliseconds.
    pub purge_interval_ms: u64,
    /// Whether the worker processes envelopes at all.
    pub enabled: bool,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            tombstone_ttl_ms: defaults::TOMBSTONE_TTL_MS,
            dedup_capacity: defaults::DEDUP_CAPACITY,
            queue_capacity: defaults::INGRESS_QUEUE_CAPACITY,
            decision_bus_capacity: defaults::DECISION_BUS_CAPACITY,
            purge_interval_ms: defaults::TOMBSTONE_PURGE_INTERVAL_MS,
            enabled: true,
        }
    }
}

impl IngressConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `INGRESS_TOMBSTONE_TTL_MS` | `60000` | Tombstone window |
    /// | `INGRESS_DEDUP_CAPACITY` | `4096` | Remembered dedup keys |
    /// | `INGRESS_QUEUE_CAPACITY` | `256` | Ingestion queue bound |
    /// | `INGRESS_DECISION_BUS_CAPACITY` | `256` | Decision bus buffer |
    /// | `INGRESS_PURGE_INTERVAL_MS` | `30000` | Tombstone purge cadence |
    /// | `INGRESS_ENABLED` | `true` | Enable/disable the worker |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let enabled = std::env::var("INGRESS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            tombstone_ttl_ms: env_parse("INGRESS_TOMBSTONE_TTL_MS", defaults.tombstone_ttl_ms)
                .max(0),
            dedup_capacity: env_parse("INGRESS_DEDUP_CAPACITY", defaults.dedup_capacity).max(1),
            queue_capacity: env_parse("INGRESS_QUEUE_CAPACITY", defaults.queue_capacity).max(1),
            decision_bus_capacity: env_parse(
                "INGRESS_DECISION_BUS_CAPACITY",
                defaults.decision_bus_capacity,
            )
            .max(1),
            purge_interval_ms: env_parse("INGRESS_PURGE_INTERVAL_MS", defaults.purge_interval_ms)
                .max(1),
            enabled,
        }
    }

    pub fn with_tombstone_ttl_ms(mut self, ms: i64) -> Self {
        self.tombstone_ttl_ms = ms;
        self
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_decision_bus_capacity(mut self, capacity: usize) -> Self {
        self.decision_bus_capacity = capacity;
        self
    }

    pub fn with_purge_interval_ms(mut self, ms: u64) -> Self {
        self.purge_interval_ms = ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tombstone_ttl_ms < 0 {
            return Err(Error::Config("tombstone TTL must not be negative".into()));
        }
        if self.dedup_capacity == 0 {
            return Err(Error::Config("dedup capacity must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be positive".into()));
        }
        if self.purge_interval_ms == 0 {
            return Err(Error::Config("purge interval must be positive".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr + Copy + std::fmt::Display>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(val) => val.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(variable = var, value = %val, %default, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Alias sets consulted by the canonicalizer and the fallback resolver.
///
/// All entries are stored normalized (trimmed, lowercase).
#[derive(Debug, Clone)]
pub struct RoutingTables {
    /// Names and payload types of the new-broadcast class.
    pub broadcast_aliases: HashSet<String>,
    /// Names and payload types of the cancellation class.
    pub cancellation_aliases: HashSet<String>,
    /// Names and payload types of the status-update class.
    pub status_update_aliases: HashSet<String>,
    /// Carrier names that trigger payload inspection.
    pub generic_carrier_names: HashSet<String>,
    /// Raw event names owned by the dedicated broadcast handler.
    pub direct_broadcast_names: HashSet<String>,
    /// Raw event names owned by the dedicated cancellation handler.
    pub direct_cancellation_names: HashSet<String>,
    /// Carrier names treated as a broadcast signal on their own.
    pub fallback_broadcast_names: HashSet<String>,
    /// Payload types signalling a broadcast.
    pub broadcast_payload_types: HashSet<String>,
    /// Payload types signalling a cancellation.
    pub cancellation_payload_types: HashSet<String>,
}

impl Default for RoutingTables {
    fn default() -> Self {
        Self {
            broadcast_aliases: set(defaults::NEW_BROADCAST_ALIASES),
            cancellation_aliases: set(defaults::CANCELLATION_ALIASES),
            status_update_aliases: set(defaults::STATUS_UPDATE_ALIASES),
            generic_carrier_names: set(defaults::GENERIC_CARRIER_NAMES),
            direct_broadcast_names: set(defaults::NEW_BROADCAST_ALIASES),
            direct_cancellation_names: set(defaults::CANCELLATION_ALIASES),
            fallback_broadcast_names: set(defaults::FALLBACK_BROADCAST_NAMES),
            broadcast_payload_types: set(defaults::NEW_BROADCAST_ALIASES),
            cancellation_payload_types: set(defaults::CANCELLATION_ALIASES),
        }
    }
}

impl RoutingTables {
    /// Register an extra raw name or payload type for the new-broadcast class.
    pub fn with_broadcast_alias(mut self, alias: &str) -> Self {
        let alias = normalize(alias);
        self.direct_broadcast_names.insert(alias.clone());
        self.broadcast_payload_types.insert(alias.clone());
        self.broadcast_aliases.insert(alias);
        self
    }

    /// Register an extra raw name or payload type for the cancellation class.
    pub fn with_cancellation_alias(mut self, alias: &str) -> Self {
        let alias = normalize(alias);
        self.direct_cancellation_names.insert(alias.clone());
        self.cancellation_payload_types.insert(alias.clone());
        self.cancellation_aliases.insert(alias);
        self
    }

    /// Register an extra generic carrier name.
    pub fn with_generic_carrier(mut self, name: &str) -> Self {
        self.generic_carrier_names.insert(normalize(name));
        self
    }
}

fn set(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| normalize(v)).collect()
}
