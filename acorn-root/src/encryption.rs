use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use acorn_core::{AcornError, AcornResult};

const NONCE_LEN: usize = 12;

/// AES-256-GCM encryption root. Wraps the payload in a tagged
/// ciphertext envelope: a random nonce prefixed to the ciphertext.
#[derive(Clone)]
pub struct EncryptionKey {
    key_id: String,
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey").field("key_id", &self.key_id).finish()
    }
}

impl EncryptionKey {
    pub fn new(key_id: impl Into<String>, key_bytes: [u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        EncryptionKey {
            key_id: key_id.into(),
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn signature(&self) -> String {
        format!("encryption:{}", self.key_id)
    }

    pub fn encrypt(&self, bytes: Vec<u8>) -> AcornResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, bytes.as_slice())
            .map_err(|_| AcornError::Serialization("encryption failed".to_string()))?;
        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    pub fn decrypt(&self, envelope: Vec<u8>) -> AcornResult<Vec<u8>> {
        if envelope.len() < NONCE_LEN {
            return Err(AcornError::Serialization("ciphertext envelope too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AcornError::Serialization("decryption failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = EncryptionKey::new("k1", [7u8; 32]);
        let original = b"secret payload".to_vec();
        let envelope = key.encrypt(original.clone()).unwrap();
        assert_ne!(envelope, original);
        assert_eq!(key.decrypt(envelope).unwrap(), original);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key_a = EncryptionKey::new("a", [1u8; 32]);
        let key_b = EncryptionKey::new("b", [2u8; 32]);
        let envelope = key_a.encrypt(b"hello".to_vec()).unwrap();
        assert!(key_b.decrypt(envelope).is_err());
    }
}
