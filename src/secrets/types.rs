//! Secure types for handling credential material.
//!
//! Vault tokens and AppRole secret ids pass through these types so they never
//! show up in logs, debug output or error messages.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Token or secret id held in memory that is zeroed on drop. `Debug` and `Display`
/// never print the value.
///
/// # Example
///
/// ```rust
/// use vault_issuer::secrets::SecretString;
///
/// let token = SecretString::from_bytes_trimmed(b"  s.abcdef\n").unwrap();
/// assert_eq!(token.expose_secret(), "s.abcdef");
/// assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Decodes raw secret-store bytes as UTF-8 and trims surrounding whitespace.
    ///
    /// Returns `None` when the bytes are not valid UTF-8.
    pub fn from_bytes_trimmed(bytes: &[u8]) -> Option<Self> {
        let value = std::str::from_utf8(bytes).ok()?;
        Some(Self(value.trim().to_owned()))
    }

    /// Plain value, for request headers and login bodies only.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
