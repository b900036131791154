//! Error types for cargolink.

use thiserror::Error;

/// Result type alias using cargolink's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cargolink operations.
///
/// Ingestion itself never surfaces these: every ingress failure degrades to a
/// dropped envelope plus a diagnostic record. Errors are reserved for the
/// surfaces around ingestion (queue handles, configuration, logout steps).
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope could not be turned into a routable event
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ingestion queue closed or full
    #[error("Channel error: {0}")]
    Channel(String),

    /// A collaborator-provided action (e.g. a logout step) failed
    #[error("Action failed: {0}")]
    Action(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
