//! Stateless cryptographic primitives: key derivation, AES-256-GCM and hex.
//!
//! This module knows nothing about domain objects. It provides the low-level
//! operations used by the field codec.
//!
//! # Envelope format
//!
//! ```text
//! hex( iv[12] || ciphertext[n] || tag[16] )
//! ```
//!
//! The stored text is therefore always `2 * (12 + n + 16)` lowercase hex
//! characters for an `n`-byte plaintext.

pub mod cipher;
pub mod hex;
pub mod kdf;

pub use self::cipher::{
    decrypt, decrypt_with_prefix_iv, describe_envelope, encrypt, encrypt_with_prefix_iv,
    random_iv, CipherError, IV_LEN, KEY_LEN, TAG_LEN,
};
pub use self::hex::{hex_decode, hex_encode, hex_with_block_size, FormatError};
pub use self::kdf::{derive_key, DerivedKey, PBKDF2_ITERATIONS};
