//! Structured logging setup.
//!
//! # Telemetry invariants
//!
//! - **No secret, key, IV or plaintext** may appear in any log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init;
