//! Secret store implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use super::{SecretRef, SecretStore};
use crate::errors::{IssuerError, Result};

type SecretData = HashMap<String, Vec<u8>>;

fn missing_key(reference: &SecretRef) -> IssuerError {
    IssuerError::secret_lookup(
        reference.to_string(),
        format!(
            "no data for {:?} in secret '{}/{}'",
            reference.key, reference.namespace, reference.name
        ),
    )
}

fn missing_secret(reference: &SecretRef) -> IssuerError {
    IssuerError::secret_lookup(
        reference.to_string(),
        format!("secret '{}/{}' not found", reference.namespace, reference.name),
    )
}

/// Map-backed secret store.
///
/// Secrets are keyed by `(namespace, name)` and hold a map of data keys to raw
/// bytes, mirroring the shape of a Kubernetes `Secret`.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<(String, String), SecretData>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for setting up a store before sharing it.
    pub fn with_secret(
        mut self,
        namespace: &str,
        name: &str,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.secrets
            .get_mut()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// Insert or replace one key of a secret.
    pub async fn insert(&self, namespace: &str, name: &str, key: &str, value: impl Into<Vec<u8>>) {
        self.secrets
            .write()
            .await
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Remove a whole secret.
    pub async fn remove(&self, namespace: &str, name: &str) {
        self.secrets.write().await.remove(&(namespace.to_string(), name.to_string()));
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, reference: &SecretRef) -> Result<Zeroizing<Vec<u8>>> {
        let secrets = self.secrets.read().await;
        let data = secrets
            .get(&(reference.namespace.clone(), reference.name.clone()))
            .ok_or_else(|| missing_secret(reference))?;

        data.get(&reference.key).map(|value| Zeroizing::new(value.clone())).ok_or_else(|| {
            missing_key(reference)
        })
    }
}

/// Secret store backed by a directory tree of mounted secrets.
///
/// A reference `(namespace, name, key)` resolves to the file
/// `<root>/<namespace>/<name>/<key>`.
///
/// # Example
///
/// ```rust,ignore
/// // /var/run/issuer-secrets/cert-manager/vault-token/token
/// let store = DirectorySecretStore::new("/var/run/issuer-secrets");
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn secret_dir(&self, reference: &SecretRef) -> Result<PathBuf> {
        validate_path_component(&reference.namespace, "namespace", reference)?;
        validate_path_component(&reference.name, "name", reference)?;
        validate_path_component(&reference.key, "key", reference)?;

        Ok(self.root.join(&reference.namespace).join(&reference.name))
    }
}

/// Rejects reference components that would escape the secret root.
fn validate_path_component(component: &str, label: &str, reference: &SecretRef) -> Result<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
    {
        return Err(IssuerError::secret_lookup(
            reference.to_string(),
            format!("invalid secret {} {:?}", label, component),
        ));
    }
    Ok(())
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    async fn get(&self, reference: &SecretRef) -> Result<Zeroizing<Vec<u8>>> {
        let dir = self.secret_dir(reference)?;

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(missing_secret(reference)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(missing_secret(reference)),
            Err(e) => {
                return Err(IssuerError::secret_lookup(reference.to_string(), e.to_string()))
            }
        }

        let path = dir.join(&reference.key);
        debug!(path = %path.display(), "Reading secret from directory store");

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Zeroizing::new(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(missing_key(reference)),
            Err(e) => Err(IssuerError::secret_lookup(reference.to_string(), e.to_string())),
        }
    }
}
