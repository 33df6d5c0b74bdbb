use crate::error::CipherError;

/// Symmetric authenticated cipher used to protect secret settings at rest.
///
/// `aad` binds the ciphertext to its record; decrypting with different
/// associated data must fail.
pub trait SecretCipher: Send + Sync {
    /// Encrypt and encode into a storable string.
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, CipherError>;

    /// Decode and decrypt a string produced by `encrypt`.
    fn decrypt(&self, encoded: &str, aad: &[u8]) -> Result<Vec<u8>, CipherError>;
}
