//! AES-256-GCM protection for secret settings.
//!
//! Ciphertext is encoded as `v1:<base64(nonce || ciphertext || tag)>` with a
//! fresh 96-bit nonce per encryption.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use confgate_core::cipher::SecretCipher;
use confgate_core::error::CipherError;

const PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// A 256-bit AES key.
#[derive(Clone)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    /// Create a key from raw bytes (must be exactly 32 bytes).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CipherError> {
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Generate a new random 256-bit key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = vec![0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { bytes: key }
    }

    /// Encode the key to base64 for storage.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Decode a key from base64.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    /// Read a base64 key from a file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, CipherError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CipherError::InvalidKey(format!("{}: {e}", path.display())))?;
        Self::from_base64(&contents)
    }
}

/// `SecretCipher` backed by AES-256-GCM.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: &SecretKey) -> Result<Self, CipherError> {
        let cipher = Aes256Gcm::new_from_slice(&key.bytes)
            .map_err(|_| CipherError::InvalidKey("AES-256 requires a 32-byte key".into()))?;
        Ok(Self { cipher })
    }
}

impl SecretCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|_| CipherError::Encryption)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(nonce.as_slice());
        raw.extend_from_slice(&ciphertext);
        Ok(format!(
            "{PREFIX}{}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        ))
    }

    fn decrypt(&self, encoded: &str, aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let body = encoded.strip_prefix(PREFIX).ok_or(CipherError::Malformed)?;
        let raw = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|_| CipherError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CipherError::Authentication)
    }
}
