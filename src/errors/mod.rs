//! # Error Handling
//!
//! Error types for the Vault issuer. Every failure is returned to the caller;
//! nothing in this crate retries or swallows an error.

pub mod types;

pub use types::{IssuerError, Result};
