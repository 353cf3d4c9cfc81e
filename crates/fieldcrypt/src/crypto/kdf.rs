//! Password-based derivation of the AES-256 field key (PBKDF2-HMAC-SHA256).

use hmac::Hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::{CipherError, KEY_LEN};

/// PBKDF2 iteration count. Changing it changes every derived key and makes
/// previously written envelopes undecryptable.
pub const PBKDF2_ITERATIONS: u32 = 65_536;

/// A 256-bit symmetric key derived from a [`Secret`](crate::secret::Secret).
///
/// The buffer is overwritten with zeroes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Raw key bytes, for handing to the cipher.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive the field key from `password` and `salt`.
///
/// Deterministic: identical inputs always yield the same key. This is slow on
/// purpose (see [`PBKDF2_ITERATIONS`]) and must not run per request; callers
/// cache the result.
///
/// # Errors
///
/// Returns [`CipherError::KeyDerivation`] if the PRF rejects its parameters.
/// That cannot happen with HMAC-SHA256 and is treated as a fatal startup
/// condition.
pub fn derive_key(password: &str, salt: &[u8]) -> Result<DerivedKey, CipherError> {
    derive_key_with_rounds(password.as_bytes(), salt, PBKDF2_ITERATIONS)
}

fn derive_key_with_rounds(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Result<DerivedKey, CipherError> {
    let mut key = DerivedKey([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, rounds, &mut key.0)
        .map_err(|_| CipherError::KeyDerivation)?;
    Ok(key)
}
