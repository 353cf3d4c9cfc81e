//! Typed value ↔ encrypted text column.
//!
//! A [`FieldCodec`] serialises a value to canonical JSON, encrypts it with the
//! field key and hex-encodes the envelope for storage. Reading reverses the
//! steps and re-attaches the value's identity, which is never stored inside
//! the envelope.
//!
//! # Failure policy
//!
//! Writes propagate every error: storing a value that cannot be encrypted is a
//! correctness bug. Reads through [`FieldCodec::decrypt_object`] swallow
//! failures and return `None`, so corrupt or legacy rows read as "no value".
//! Each swallowed failure is logged at `warn` (identity and error kind only)
//! so operators can tell the two apart.

pub mod field;

pub use field::{CodecError, FieldCodec};
