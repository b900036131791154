//! # cargolink-core
//!
//! Core types, defaults, and abstractions for the cargolink broadcast
//! ingress layer.
//!
//! This crate provides the data model shared by the ingress coordinator and
//! its collaborators (transports, presentation, session management), the
//! single source of default constants and alias tables, structured logging
//! field names, and the [`DecisionBus`] used to hand routed decisions to
//! presentation.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::DecisionBus;
pub use models::*;
