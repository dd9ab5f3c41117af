//! # Observability
//!
//! Logging bootstrap for the `vault-issuer` binary.

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
