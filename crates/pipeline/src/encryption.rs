//! Payload encryption collaborators.
//!
//! Encryptors are deterministic for fixed key material and map empty input
//! to empty output. Key material always comes from outside the program.

use crate::error::{PipelineError, PipelineResult};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use coldvault_core::EncryptionScheme;
use coldvault_core::config::EncryptionConfig;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::sync::Arc;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;

/// Turns plaintext into ciphertext and back.
pub trait Encryptor: Send + Sync {
    fn scheme(&self) -> EncryptionScheme;
    fn encrypt(&self, plaintext: &[u8]) -> PipelineResult<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> PipelineResult<Vec<u8>>;
}

/// Passes bytes through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextEncryptor;

impl Encryptor for PlaintextEncryptor {
    fn scheme(&self) -> EncryptionScheme {
        EncryptionScheme::Plaintext
    }

    fn encrypt(&self, plaintext: &[u8]) -> PipelineResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> PipelineResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

/// Key and nonce for [`AesGcmEncryptor`].
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKeys {
    key: [u8; KEY_SIZE],
    nonce: [u8; NONCE_SIZE],
}

impl fmt::Debug for EncryptionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeys").finish_non_exhaustive()
    }
}

impl EncryptionKeys {
    pub fn new(key: [u8; KEY_SIZE], nonce: [u8; NONCE_SIZE]) -> Self {
        Self { key, nonce }
    }

    /// Fresh random material, for first-time setup.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut nonce);
        Self { key, nonce }
    }

    /// Decode base64 key and nonce strings.
    pub fn from_base64(key: &str, nonce: &str) -> PipelineResult<Self> {
        Ok(Self {
            key: decode_exact::<KEY_SIZE>("key", key)?,
            nonce: decode_exact::<NONCE_SIZE>("nonce", nonce)?,
        })
    }

    /// Read key material from the environment variables named in `config`.
    pub fn from_env(config: &EncryptionConfig) -> PipelineResult<Self> {
        let key = read_env(&config.key_env)?;
        let nonce = read_env(&config.nonce_env)?;
        Self::from_base64(&key, &nonce)
    }

    /// Base64 key and nonce, suitable for exporting into the environment.
    pub fn to_base64(&self) -> (String, String) {
        (STANDARD.encode(self.key), STANDARD.encode(self.nonce))
    }
}

fn read_env(name: &str) -> PipelineResult<String> {
    std::env::var(name).map_err(|_| PipelineError::KeyMaterial(format!("{name} is not set")))
}

fn decode_exact<const N: usize>(what: &str, encoded: &str) -> PipelineResult<[u8; N]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| PipelineError::KeyMaterial(format!("{what} is not valid base64: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        PipelineError::KeyMaterial(format!("{what} must be {N} bytes, got {}", bytes.len()))
    })
}

/// AES-256-GCM with a fixed, externally supplied nonce.
///
/// Output is deterministic for fixed key material. Not a hardened
/// construction: every payload shares the nonce.
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
    nonce: [u8; NONCE_SIZE],
}

impl AesGcmEncryptor {
    pub fn new(keys: &EncryptionKeys) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&keys.key)),
            nonce: keys.nonce,
        }
    }
}

impl Encryptor for AesGcmEncryptor {
    fn scheme(&self) -> EncryptionScheme {
        EncryptionScheme::Aes
    }

    fn encrypt(&self, plaintext: &[u8]) -> PipelineResult<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }
        self.cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|e| PipelineError::Encryption(e.to_string()))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> PipelineResult<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        self.cipher
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext)
            .map_err(|e| PipelineError::Encryption(format!("decryption failed: {e}")))
    }
}

/// Encryptor for `scheme`; AES needs key material.
pub fn encryptor_for(
    scheme: EncryptionScheme,
    keys: Option<&EncryptionKeys>,
) -> PipelineResult<Arc<dyn Encryptor>> {
    match scheme {
        EncryptionScheme::Plaintext => Ok(Arc::new(PlaintextEncryptor)),
        EncryptionScheme::Aes => {
            let keys = keys.ok_or_else(|| {
                PipelineError::KeyMaterial("AES encryption requires key material".to_string())
            })?;
            Ok(Arc::new(AesGcmEncryptor::new(keys)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> EncryptionKeys {
        EncryptionKeys::new([7u8; KEY_SIZE], [3u8; NONCE_SIZE])
    }

    #[test]
    fn test_aes_is_deterministic_and_reversible() {
        let enc = AesGcmEncryptor::new(&keys());
        let a = enc.encrypt(b"cold storage").unwrap();
        let b = enc.encrypt(b"cold storage").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, b"cold storage");
        assert_eq!(enc.decrypt(&a).unwrap(), b"cold storage");
    }

    #[test]
    fn test_empty_in_empty_out() {
        let enc = AesGcmEncryptor::new(&keys());
        assert!(enc.encrypt(b"").unwrap().is_empty());
        assert!(enc.decrypt(b"").unwrap().is_empty());
        assert!(PlaintextEncryptor.encrypt(b"").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails_to_decrypt() {
        let ciphertext = AesGcmEncryptor::new(&keys()).encrypt(b"data").unwrap();
        let other = AesGcmEncryptor::new(&EncryptionKeys::new([8u8; KEY_SIZE], [3u8; NONCE_SIZE]));
        assert!(matches!(
            other.decrypt(&ciphertext),
            Err(PipelineError::Encryption(_))
        ));
    }

    #[test]
    fn test_base64_round_trip_and_lengths() {
        let generated = EncryptionKeys::generate();
        let (key, nonce) = generated.to_base64();
        assert_eq!(EncryptionKeys::from_base64(&key, &nonce).unwrap(), generated);

        let short = STANDARD.encode([0u8; 16]);
        let err = EncryptionKeys::from_base64(&short, &nonce).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
        assert!(EncryptionKeys::from_base64(&key, "***").is_err());
    }

    #[test]
    fn test_from_env_reports_missing_variable() {
        let config = EncryptionConfig {
            key_env: "COLDVAULT_TEST_UNSET_KEY_VAR".to_string(),
            nonce_env: "COLDVAULT_TEST_UNSET_NONCE_VAR".to_string(),
        };
        let err = EncryptionKeys::from_env(&config).unwrap_err();
        assert!(err.to_string().contains("COLDVAULT_TEST_UNSET_KEY_VAR"));
    }

    #[test]
    fn test_debug_hides_material() {
        let debug = format!("{:?}", keys());
        assert!(!debug.contains('7'));
    }

    #[test]
    fn test_encryptor_for_requires_keys_for_aes() {
        assert!(encryptor_for(EncryptionScheme::Aes, None).is_err());
        let enc = encryptor_for(EncryptionScheme::Aes, Some(&keys())).unwrap();
        assert_eq!(enc.scheme(), EncryptionScheme::Aes);
        let plain = encryptor_for(EncryptionScheme::Plaintext, None).unwrap();
        assert_eq!(plain.scheme(), EncryptionScheme::Plaintext);
    }
}
