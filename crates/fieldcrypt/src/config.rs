//! Configuration loading and validation for the `fieldcrypt` binary.
//!
//! All values are read from environment variables at startup. The process
//! exits with a clear error message if any required variable is missing or
//! invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::secret::Secret;

/// Validated configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Password the field key is derived from. **Required.**
    pub field_encryption_password: String,

    /// Salt for key derivation, used as the raw bytes of its text. **Required.**
    pub field_encryption_salt: String,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Build the encryption secret from the configured values.
    pub fn secret(&self) -> Result<Secret> {
        Secret::new(
            self.field_encryption_password.as_str(),
            self.field_encryption_salt.as_str(),
        )
        .context("invalid field encryption secret")
    }

    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.field_encryption_password, "FIELD_ENCRYPTION_PASSWORD")?;
        ensure_non_empty(&self.field_encryption_salt, "FIELD_ENCRYPTION_SALT")?;
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("field_encryption_password", &"[REDACTED]")
            .field("field_encryption_salt", &"[REDACTED]")
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
