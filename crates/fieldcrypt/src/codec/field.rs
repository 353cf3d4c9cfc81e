//! [`FieldCodec`]: generic encrypt/decrypt helper with a lazily derived key.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use common::Identified;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::crypto::{
    decrypt_with_prefix_iv, derive_key, encrypt_with_prefix_iv, hex_decode, hex_encode,
    random_iv, CipherError, DerivedKey, IV_LEN,
};
use crate::secret::{SecretError, SecretProvider};

/// Errors produced by the codec layer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The secret could not be obtained to derive the key.
    #[error("secret unavailable: {0}")]
    Secret(#[from] SecretError),

    /// Key derivation, encryption, decryption or envelope decoding failed.
    #[error("encryption failure: {0}")]
    Encryption(#[from] CipherError),

    /// The value could not be converted to or from canonical text.
    #[error("serialisation failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CodecError {
    /// Short label for logs. Unlike `Display`, never includes input fragments.
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::Secret(_) => "secret",
            CodecError::Encryption(_) => "encryption",
            CodecError::Serialization(_) => "serialization",
        }
    }
}

/// Encrypts values of type `T` into hex envelopes and back.
///
/// The key is derived from the provider's secret on first use and cached for
/// the lifetime of the codec (`UNINITIALIZED -> KEYED`, never reset). The
/// provider may be populated after construction as long as that happens
/// before the first encrypt or decrypt call. Concurrent first calls derive the
/// key exactly once.
pub struct FieldCodec<T> {
    provider: Arc<dyn SecretProvider>,
    key: OnceLock<DerivedKey>,
    init: Mutex<()>,
    _value: PhantomData<fn() -> T>,
}

impl<T> FieldCodec<T> {
    /// Create a codec reading its secret from `provider`.
    pub fn new(provider: Arc<dyn SecretProvider>) -> Self {
        Self {
            provider,
            key: OnceLock::new(),
            init: Mutex::new(()),
            _value: PhantomData,
        }
    }

    /// Returns `true` once the key has been derived.
    pub fn is_keyed(&self) -> bool {
        self.key.get().is_some()
    }

    /// Return the cached key, deriving it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Secret`] if the provider has no secret yet, or
    /// [`CodecError::Encryption`] if derivation fails. In both cases the codec
    /// stays unkeyed and a later call retries.
    pub fn key(&self) -> Result<&DerivedKey, CodecError> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = self.key.get() {
            return Ok(key);
        }
        let secret = self.provider.secret()?;
        debug!("deriving field encryption key");
        let key = derive_key(secret.password(), secret.salt())?;
        Ok(self.key.get_or_init(|| key))
    }

    /// Encrypt `text` under a fresh random IV and hex-encode the envelope.
    ///
    /// Two calls with the same text produce different output.
    pub fn encrypt_to_hex_string(&self, text: &str) -> Result<String, CodecError> {
        let key = self.key()?;
        let iv = random_iv(IV_LEN);
        let envelope = encrypt_with_prefix_iv(text.as_bytes(), key.as_bytes(), &iv)?;
        Ok(hex_encode(&envelope))
    }

    /// Hex-decode and decrypt an envelope produced by
    /// [`FieldCodec::encrypt_to_hex_string`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encryption`] for malformed hex, a truncated
    /// envelope or an authentication failure.
    pub fn decrypt_hex_string(&self, hex_text: &str) -> Result<String, CodecError> {
        let envelope = hex_decode(hex_text).map_err(CipherError::from)?;
        let key = self.key()?;
        Ok(decrypt_with_prefix_iv(&envelope, key.as_bytes())?)
    }
}

impl<T> FieldCodec<T>
where
    T: Serialize + DeserializeOwned + Identified,
{
    /// Serialise and encrypt `value`. `None` passes through untouched.
    ///
    /// # Errors
    ///
    /// Every serialisation or cipher failure is returned; nothing is swallowed
    /// on the write path.
    pub fn encrypt_object(&self, value: Option<&T>) -> Result<Option<String>, CodecError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let plain = serde_json::to_string(value)?;
        self.encrypt_to_hex_string(&plain).map(Some)
    }

    /// Materialise a value from its stored envelope.
    ///
    /// - An `existing` value is returned unchanged; the envelope is not read.
    /// - A missing or blank envelope yields `None`.
    /// - Otherwise the envelope is decrypted, parsed, and `id` is attached.
    ///
    /// **Any failure is swallowed and yields `None`.** Callers cannot tell
    /// "no value" from "corrupt value" through this call; the failure is only
    /// visible in the logs. Use [`FieldCodec::decrypt_hex_string`] when the
    /// error matters.
    pub fn decrypt_object(
        &self,
        id: i64,
        existing: Option<T>,
        encrypted_hex: Option<&str>,
    ) -> Option<T> {
        if existing.is_some() {
            return existing;
        }
        let encrypted_hex = encrypted_hex.filter(|s| !s.trim().is_empty())?;
        match self.decode(id, encrypted_hex) {
            Ok(value) => Some(value),
            Err(e @ CodecError::Secret(_)) => {
                error!(id, kind = e.kind(), "field key unavailable; returning no value");
                None
            }
            Err(e) => {
                warn!(id, kind = e.kind(), "discarding undecryptable field value");
                None
            }
        }
    }

    fn decode(&self, id: i64, encrypted_hex: &str) -> Result<T, CodecError> {
        let plain = self.decrypt_hex_string(encrypted_hex)?;
        let mut value: T = serde_json::from_str(&plain)?;
        value.set_id(id);
        Ok(value)
    }
}

impl<T> std::fmt::Debug for FieldCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCodec")
            .field("keyed", &self.is_keyed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TAG_LEN;
    use crate::secret::{MockSecretProvider, Secret, SecretCell};
    use common::CustomerAddress;

    fn codec() -> FieldCodec<CustomerAddress> {
        FieldCodec::new(Arc::new(Secret::new("secret", "pepper").unwrap()))
    }

    fn springfield() -> CustomerAddress {
        CustomerAddress {
            street: Some("Main St".into()),
            city: Some("Springfield".into()),
            ..CustomerAddress::default()
        }
    }

    fn flip(c: char) -> char {
        if c == '0' {
            '1'
        } else {
            '0'
        }
    }

    #[test]
    fn object_round_trip_attaches_id() {
        let codec = codec();
        let hex = codec.encrypt_object(Some(&springfield())).unwrap().unwrap();
        let decrypted = codec.decrypt_object(1, None, Some(&hex)).unwrap();
        assert_eq!(decrypted.id, Some(1));
        assert_eq!(decrypted.street.as_deref(), Some("Main St"));
        assert_eq!(decrypted.city.as_deref(), Some("Springfield"));
        assert_eq!(decrypted.postcode, None);
    }

    #[test]
    fn envelope_length_and_case() {
        let codec = codec();
        let value = springfield();
        let plain_len = serde_json::to_string(&value).unwrap().len();
        let hex = codec.encrypt_object(Some(&value)).unwrap().unwrap();
        assert_eq!(hex.len(), 2 * (IV_LEN + plain_len + TAG_LEN));
        assert!(hex.len() >= 74);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn identity_is_not_in_envelope() {
        let codec = codec();
        let mut value = springfield();
        value.id = Some(99);
        let hex = codec.encrypt_object(Some(&value)).unwrap().unwrap();
        let plain = codec.decrypt_hex_string(&hex).unwrap();
        assert!(!plain.contains("99"));
        assert_eq!(codec.decrypt_object(5, None, Some(&hex)).unwrap().id, Some(5));
    }

    #[test]
    fn encryption_is_not_deterministic() {
        let codec = codec();
        let a = codec.encrypt_to_hex_string("same text").unwrap();
        let b = codec.encrypt_to_hex_string("same text").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..2 * IV_LEN], b[..2 * IV_LEN]);
        assert_eq!(codec.decrypt_hex_string(&a).unwrap(), "same text");
        assert_eq!(codec.decrypt_hex_string(&b).unwrap(), "same text");
    }

    #[test]
    fn uppercase_envelope_is_accepted() {
        let codec = codec();
        let hex = codec.encrypt_to_hex_string("shout").unwrap();
        assert_eq!(codec.decrypt_hex_string(&hex.to_uppercase()).unwrap(), "shout");
    }

    #[test]
    fn every_single_character_flip_is_detected() {
        let codec = codec();
        let hex = codec.encrypt_to_hex_string("tamper me").unwrap();
        for i in 0..hex.len() {
            let tampered: String = hex
                .char_indices()
                .map(|(j, c)| if i == j { flip(c) } else { c })
                .collect();
            assert!(
                matches!(
                    codec.decrypt_hex_string(&tampered),
                    Err(CodecError::Encryption(CipherError::AeadFailure))
                ),
                "flip at hex index {i} was not detected"
            );
        }
    }

    #[test]
    fn malformed_hex_is_an_encryption_error() {
        let codec = codec();
        assert!(matches!(
            codec.decrypt_hex_string("abc"),
            Err(CodecError::Encryption(CipherError::MalformedHex(_)))
        ));
        assert!(matches!(
            codec.decrypt_hex_string("zz"),
            Err(CodecError::Encryption(CipherError::MalformedHex(_)))
        ));
        assert!(matches!(
            codec.decrypt_hex_string("00ff"),
            Err(CodecError::Encryption(CipherError::EnvelopeTooShort(2)))
        ));
    }

    #[test]
    fn wrong_secret_cannot_decrypt() {
        let hex = codec().encrypt_object(Some(&springfield())).unwrap().unwrap();
        let other: FieldCodec<CustomerAddress> =
            FieldCodec::new(Arc::new(Secret::new("secret", "paprika").unwrap()));
        assert!(matches!(
            other.decrypt_hex_string(&hex),
            Err(CodecError::Encryption(CipherError::AeadFailure))
        ));
        assert_eq!(other.decrypt_object(1, None, Some(&hex)), None);
    }

    #[test]
    fn null_safety() {
        // No expectations: any read of the secret would panic.
        let codec: FieldCodec<CustomerAddress> =
            FieldCodec::new(Arc::new(MockSecretProvider::new()));
        assert_eq!(codec.encrypt_object(None).unwrap(), None);
        assert_eq!(codec.decrypt_object(1, None, None), None);
        assert_eq!(codec.decrypt_object(1, None, Some("")), None);
        assert_eq!(codec.decrypt_object(1, None, Some("   ")), None);
        assert!(!codec.is_keyed());
    }

    #[test]
    fn existing_value_is_never_overwritten() {
        let codec: FieldCodec<CustomerAddress> =
            FieldCodec::new(Arc::new(MockSecretProvider::new()));
        let existing = CustomerAddress {
            id: Some(3),
            city: Some("Shelbyville".into()),
            ..CustomerAddress::default()
        };
        let result = codec.decrypt_object(1, Some(existing.clone()), Some("not even hex"));
        assert_eq!(result, Some(existing));
    }

    #[test]
    fn corrupt_data_reads_as_none() {
        let codec = codec();
        assert_eq!(codec.decrypt_object(1, None, Some("xyz")), None);
        assert_eq!(codec.decrypt_object(1, None, Some("00ff")), None);

        let mut hex = codec.encrypt_object(Some(&springfield())).unwrap().unwrap();
        let last = hex.pop().unwrap();
        hex.push(flip(last));
        assert_eq!(codec.decrypt_object(1, None, Some(&hex)), None);
    }

    #[test]
    fn unparseable_plaintext_reads_as_none() {
        let codec = codec();
        let hex = codec.encrypt_to_hex_string("not json").unwrap();
        assert_eq!(codec.decrypt_object(1, None, Some(&hex)), None);

        let hex = codec.encrypt_to_hex_string(r#"{"street": 42}"#).unwrap();
        assert_eq!(codec.decrypt_object(1, None, Some(&hex)), None);
    }

    #[test]
    fn secret_may_arrive_after_construction() {
        let cell = SecretCell::new();
        let codec: FieldCodec<CustomerAddress> = FieldCodec::new(Arc::new(cell.clone()));
        assert!(matches!(
            codec.encrypt_to_hex_string("early"),
            Err(CodecError::Secret(SecretError::NotInitialised))
        ));
        assert!(!codec.is_keyed());

        cell.set(Secret::new("secret", "pepper").unwrap()).unwrap();
        let hex = codec.encrypt_to_hex_string("late").unwrap();
        assert!(codec.is_keyed());
        assert_eq!(codec.decrypt_hex_string(&hex).unwrap(), "late");
    }

    #[test]
    fn secret_is_read_once() {
        let mut provider = MockSecretProvider::new();
        provider
            .expect_secret()
            .times(1)
            .returning(|| Secret::new("secret", "pepper"));
        let codec: FieldCodec<CustomerAddress> = FieldCodec::new(Arc::new(provider));

        let hex = codec.encrypt_object(Some(&springfield())).unwrap().unwrap();
        for id in 0..5 {
            assert!(codec.decrypt_object(id, None, Some(&hex)).is_some());
        }
        codec.encrypt_to_hex_string("again").unwrap();
    }

    #[test]
    fn concurrent_first_use_derives_once() {
        let mut provider = MockSecretProvider::new();
        provider
            .expect_secret()
            .times(1)
            .returning(|| Secret::new("secret", "pepper"));
        let codec: FieldCodec<CustomerAddress> = FieldCodec::new(Arc::new(provider));

        let keys: Vec<Vec<u8>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| codec.key().unwrap().as_bytes().to_vec()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn cached_key_matches_direct_derivation() {
        let codec = codec();
        let direct = derive_key("secret", b"pepper").unwrap();
        assert_eq!(codec.key().unwrap().as_bytes(), direct.as_bytes());
    }

    #[test]
    fn error_kind_labels() {
        assert_eq!(CodecError::from(SecretError::NotInitialised).kind(), "secret");
        assert_eq!(CodecError::from(CipherError::AeadFailure).kind(), "encryption");
    }

    /// Run `f` under a JSON subscriber and return the emitted events.
    fn capture_events(f: impl FnOnce()) -> Vec<serde_json::Value> {
        use std::io::Write;

        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl Write for Buffer {
            fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(bytes);
                Ok(bytes.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn at_level<'a>(events: &'a [serde_json::Value], level: &str) -> Vec<&'a serde_json::Value> {
        events.iter().filter(|e| e["level"] == level).collect()
    }

    #[test]
    fn tampered_envelope_logs_one_warning() {
        let codec = codec();
        let mut hex = codec.encrypt_object(Some(&springfield())).unwrap().unwrap();
        let last = hex.pop().unwrap();
        hex.push(flip(last));

        let events = capture_events(|| assert_eq!(codec.decrypt_object(11, None, Some(&hex)), None));
        let warnings = at_level(&events, "WARN");
        assert_eq!(warnings.len(), 1, "events: {events:?}");
        assert_eq!(warnings[0]["fields"]["id"], 11);
        assert_eq!(warnings[0]["fields"]["kind"], "encryption");
        assert!(at_level(&events, "ERROR").is_empty());
    }

    #[test]
    fn parse_failure_is_logged_without_plaintext() {
        let codec = codec();
        let hex = codec
            .encrypt_to_hex_string(r#"{"street": 4242}"#)
            .unwrap();

        let events = capture_events(|| assert_eq!(codec.decrypt_object(3, None, Some(&hex)), None));
        let warnings = at_level(&events, "WARN");
        assert_eq!(warnings.len(), 1, "events: {events:?}");
        assert_eq!(warnings[0]["fields"]["id"], 3);
        assert_eq!(warnings[0]["fields"]["kind"], "serialization");

        let rendered = serde_json::to_string(&events).unwrap();
        assert!(!rendered.contains("4242"), "plaintext leaked: {rendered}");
        assert!(!rendered.contains("street"), "plaintext leaked: {rendered}");
        assert!(!rendered.contains(&hex), "envelope leaked: {rendered}");
    }

    #[test]
    fn missing_secret_logs_an_error() {
        let codec: FieldCodec<CustomerAddress> = FieldCodec::new(Arc::new(SecretCell::new()));

        let events = capture_events(|| assert_eq!(codec.decrypt_object(5, None, Some("00ff")), None));
        let errors = at_level(&events, "ERROR");
        assert_eq!(errors.len(), 1, "events: {events:?}");
        assert_eq!(errors[0]["fields"]["id"], 5);
        assert_eq!(errors[0]["fields"]["kind"], "secret");
        assert!(at_level(&events, "WARN").is_empty());
    }

    #[test]
    fn successful_read_logs_no_warning() {
        let codec = codec();
        let hex = codec.encrypt_object(Some(&springfield())).unwrap().unwrap();

        let events = capture_events(|| assert!(codec.decrypt_object(1, None, Some(&hex)).is_some()));
        assert!(at_level(&events, "WARN").is_empty());
        assert!(at_level(&events, "ERROR").is_empty());
        let rendered = serde_json::to_string(&events).unwrap();
        assert!(!rendered.contains("Springfield"));
        assert!(!rendered.contains("pepper"));
    }
}
