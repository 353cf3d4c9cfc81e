//! The process-wide encryption secret (password + salt) and how it reaches the
//! field codec.
//!
//! # Lifecycle
//!
//! 1. At startup a [`SecretCell`] is created, possibly before configuration
//!    has been loaded, and handed to every codec that needs it.
//! 2. Once configuration is available, [`SecretCell::set`] populates it. This
//!    happens exactly once; there is no reload.
//! 3. On first use each codec reads the secret through the
//!    [`SecretProvider`] capability and derives its key. The secret is not
//!    read again afterwards.
//!
//! # Security invariants
//!
//! - The secret is used only to derive a key. It is never persisted or logged
//!   and its `Debug` output is redacted.
//! - Secret buffers are zeroed on drop.

pub mod store;

pub use store::{Secret, SecretCell, SecretError, SecretProvider};

#[cfg(test)]
pub use store::MockSecretProvider;
