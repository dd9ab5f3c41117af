//! Secret store abstraction for issuer credentials.
//!
//! The issuer never holds raw credential material in its configuration. It holds
//! [`SecretRef`]s, `(namespace, name, key)` triples, and resolves them through a
//! [`SecretStore`] when it authenticates against Vault.
//!
//! # Available Stores
//!
//! - [`InMemorySecretStore`]: map-backed store for tests and embedding
//! - [`DirectorySecretStore`]: reads `<root>/<namespace>/<name>/<key>` files, the layout
//!   produced by mounting Kubernetes secrets into a pod
//!
//! # Example
//!
//! ```rust,ignore
//! use vault_issuer::secrets::{InMemorySecretStore, SecretRef, SecretStore};
//!
//! let store = InMemorySecretStore::new().with_secret("default", "vault-token", "token", "s.abc");
//! let value = store.get(&SecretRef::new("default", "vault-token", "token")).await?;
//! ```

pub mod store;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::errors::Result;

pub use store::{DirectorySecretStore, InMemorySecretStore};
pub use types::SecretString;

/// Key looked up for the token strategy when the reference leaves it unset.
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Reference to one key of a secret held by the external secret store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

impl SecretRef {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self { namespace: namespace.into(), name: name.into(), key: key.into() }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

/// Lookup interface onto the external secret store.
///
/// Implementations return the raw bytes stored under the referenced key, or
/// `IssuerError::SecretLookup` when the secret or the key does not exist.
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    async fn get(&self, reference: &SecretRef) -> Result<Zeroizing<Vec<u8>>>;
}
