//! Transparent field-level encryption.
//!
//! A typed value is serialised to canonical JSON, encrypted with AES-256-GCM
//! under a key derived from a password and salt (PBKDF2-HMAC-SHA256), and
//! stored as a lowercase hex envelope `hex(iv || ciphertext || tag)`.
//!
//! - [`crypto`] — stateless primitives: key derivation, AEAD, hex.
//! - [`secret`] — the process secret and its set-once provider.
//! - [`codec`] — [`FieldCodec`], the typed encrypt/decrypt helper.
//! - [`customer`] — the customer address column built on the codec.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod customer;
pub mod secret;
pub mod telemetry;

pub use codec::{CodecError, FieldCodec};
pub use secret::{Secret, SecretCell, SecretError, SecretProvider};
