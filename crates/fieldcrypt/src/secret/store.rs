//! [`Secret`], the [`SecretProvider`] capability and the one-shot [`SecretCell`].

use std::sync::{Arc, OnceLock};

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors produced by the secret layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    /// A required secret field is empty.
    #[error("encryption secret {0} must not be empty")]
    Empty(&'static str),

    /// The secret has not been provided yet.
    #[error("encryption secret not yet initialised")]
    NotInitialised,

    /// The secret was already provided; it cannot be replaced.
    #[error("encryption secret already initialised")]
    AlreadyInitialised,
}

/// Password and salt from which the field key is derived.
///
/// The salt is taken as the raw bytes of its text, not decoded from hex or
/// base64.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    password: String,
    salt: Vec<u8>,
}

impl Secret {
    /// Build a secret from its configured text values.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Empty`] if either value is empty.
    pub fn new(password: impl Into<String>, salt: impl Into<String>) -> Result<Self, SecretError> {
        let password = password.into();
        let salt = salt.into();
        if password.is_empty() {
            return Err(SecretError::Empty("password"));
        }
        if salt.is_empty() {
            return Err(SecretError::Empty("salt"));
        }
        Ok(Self {
            password,
            salt: salt.into_bytes(),
        })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Source of the encryption secret for a codec.
///
/// Codecs call [`SecretProvider::secret`] at most once, on first use, so a
/// provider may become ready after the codec was constructed.
#[cfg_attr(test, mockall::automock)]
pub trait SecretProvider: Send + Sync {
    /// Return the current secret.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotInitialised`] if no secret is available yet.
    fn secret(&self) -> Result<Secret, SecretError>;
}

/// A secret known up front is its own provider.
impl SecretProvider for Secret {
    fn secret(&self) -> Result<Secret, SecretError> {
        Ok(self.clone())
    }
}

/// Shared, set-once holder for the process secret.
///
/// Cloning is cheap and all clones observe the same value. Reads before
/// [`SecretCell::set`] fail with [`SecretError::NotInitialised`].
#[derive(Clone, Debug, Default)]
pub struct SecretCell {
    inner: Arc<OnceLock<Secret>>,
}

impl SecretCell {
    /// Create a new, empty [`SecretCell`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a secret has been set.
    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Provide the secret.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::AlreadyInitialised`] if a secret was already set;
    /// the stored secret is left unchanged.
    pub fn set(&self, secret: Secret) -> Result<(), SecretError> {
        self.inner
            .set(secret)
            .map_err(|_| SecretError::AlreadyInitialised)
    }
}

impl SecretProvider for SecretCell {
    fn secret(&self) -> Result<Secret, SecretError> {
        self.inner.get().cloned().ok_or(SecretError::NotInitialised)
    }
}
