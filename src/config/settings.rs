//! # Configuration Loading
//!
//! Loads an [`IssuerSpec`] from a YAML/TOML/JSON file, layered with environment
//! overrides such as `VAULT_ISSUER__SERVER` or `VAULT_ISSUER__AUTH__APP_ROLE__ROLE_ID`.

use std::path::Path;

use config::{Config, Environment, File};
use tracing::debug;

use super::IssuerSpec;
use crate::errors::{IssuerError, Result};

/// Environment prefix for issuer overrides
pub const ENV_PREFIX: &str = "VAULT_ISSUER";

/// Load an issuer spec from `path` with `VAULT_ISSUER__*` overrides applied.
///
/// The file format is inferred from the extension.
pub fn load_issuer_spec(path: &Path) -> Result<IssuerSpec> {
    load_issuer_spec_with_prefix(path, ENV_PREFIX)
}

/// Same as [`load_issuer_spec`] with a custom environment prefix.
pub fn load_issuer_spec_with_prefix(path: &Path, env_prefix: &str) -> Result<IssuerSpec> {
    debug!(path = %path.display(), env_prefix = %env_prefix, "Loading issuer configuration");

    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .map_err(|e| {
            IssuerError::config(format!(
                "failed to load issuer configuration from {}: {}",
                path.display(),
                e
            ))
        })?;

    settings
        .try_deserialize::<IssuerSpec>()
        .map_err(|e| IssuerError::config(format!("invalid issuer configuration: {}", e)))
}
