//! AES-256-GCM encryption and decryption of byte buffers.
//!
//! Every envelope is `iv || ciphertext || tag`: a 12-byte IV followed by the
//! ciphertext with the 16-byte authentication tag appended by the cipher.
//!
//! **An IV must never be reused with the same key.** GCM nonce reuse breaks
//! both confidentiality and authentication, so [`random_iv`] is called for
//! every encryption and the IV is never cached.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

use super::hex::{hex_with_block_size, FormatError};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Errors produced by the cipher layer.
///
/// Authentication failures are reported as [`CipherError::AeadFailure`]
/// whatever the cause: wrong key, tampered ciphertext and tampered tag are
/// indistinguishable to the caller.
#[derive(Debug, Error)]
pub enum CipherError {
    /// PBKDF2 could not be run with the requested parameters.
    #[error("key derivation failed")]
    KeyDerivation,

    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// The IV is the wrong length (must be [`IV_LEN`] bytes).
    #[error("invalid IV length: expected {expected} bytes, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    /// The envelope is too short to contain an IV.
    #[error("envelope too short: {0} bytes")]
    EnvelopeTooShort(usize),

    /// AES-GCM encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The authenticated plaintext is not UTF-8 text.
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,

    /// The stored envelope text is not valid hex.
    #[error("malformed envelope: {0}")]
    MalformedHex(#[from] FormatError),
}

/// Generate `len` bytes from the OS CSPRNG for use as an IV.
pub fn random_iv(len: usize) -> Vec<u8> {
    use aes_gcm::aead::rand_core::RngCore;
    let mut iv = vec![0u8; len];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under `key` with `iv`, returning `ciphertext || tag`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes,
/// [`CipherError::InvalidIvLength`] if `iv` is not [`IV_LEN`] bytes, and
/// [`CipherError::AeadFailure`] if the cipher itself fails.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    check_iv(iv)?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| CipherError::AeadFailure)
}

/// Encrypt and prefix the IV: `iv || encrypt(plaintext, key, iv)`.
///
/// The IV is always the first [`IV_LEN`] bytes of the result, so it never
/// needs to be stored separately.
pub fn encrypt_with_prefix_iv(
    plaintext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let ciphertext = encrypt(plaintext, key, iv)?;
    let mut envelope = Vec::with_capacity(iv.len() + ciphertext.len());
    envelope.extend_from_slice(iv);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Verify and decrypt `ciphertext || tag` back to text.
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key or
/// tampered data), [`CipherError::InvalidUtf8`] if the plaintext is not text,
/// and the length errors of [`encrypt`] for a bad key or IV.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<String, CipherError> {
    let cipher = build_cipher(key)?;
    check_iv(iv)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CipherError::AeadFailure)?;
    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
}

/// Split the leading IV off `envelope` and decrypt the remainder.
///
/// # Errors
///
/// Returns [`CipherError::EnvelopeTooShort`] if `envelope` is shorter than
/// [`IV_LEN`] bytes; otherwise as [`decrypt`].
pub fn decrypt_with_prefix_iv(envelope: &[u8], key: &[u8]) -> Result<String, CipherError> {
    if envelope.len() < IV_LEN {
        return Err(CipherError::EnvelopeTooShort(envelope.len()));
    }
    let (iv, ciphertext) = envelope.split_at(IV_LEN);
    decrypt(ciphertext, key, iv)
}

/// Describe the layout of `envelope` without decrypting it.
///
/// Shows the IV and the `ciphertext || tag` section as hex blocks of
/// [`TAG_LEN`] bytes, plus the implied plaintext length. Needs no key.
///
/// # Errors
///
/// Returns [`CipherError::EnvelopeTooShort`] if `envelope` cannot hold an IV
/// and a tag.
pub fn describe_envelope(envelope: &[u8]) -> Result<String, CipherError> {
    if envelope.len() < IV_LEN + TAG_LEN {
        return Err(CipherError::EnvelopeTooShort(envelope.len()));
    }
    let (iv, sealed) = envelope.split_at(IV_LEN);
    Ok(format!(
        "iv: {}\nciphertext+tag: {}\nplaintext length: {} bytes",
        hex_with_block_size(iv, IV_LEN),
        hex_with_block_size(sealed, TAG_LEN),
        sealed.len() - TAG_LEN,
    ))
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

fn check_iv(iv: &[u8]) -> Result<(), CipherError> {
    if iv.len() != IV_LEN {
        return Err(CipherError::InvalidIvLength {
            expected: IV_LEN,
            got: iv.len(),
        });
    }
    Ok(())
}
