//! Field-level protection for personal data.
//!
//! CPF values are stored as `enc1:<nonce>:<ciphertext>` (base64, AES-256-GCM).
//! The prefix marks a value as already protected so it is never encrypted
//! twice, and values without it are treated as legacy plaintext on read.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

pub const FIELD_PREFIX: &str = "enc1:";

fn encrypt_aes_gcm(plaintext: &[u8], key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Invalid key size: expected {KEY_SIZE}, got {}", key.len()));
    }

    let key = Key::<Aes256Gcm>::from_slice(key);
    let cipher = Aes256Gcm::new(key);

    let mut rng = rand::rng();
    let nonce_bytes: [u8; NONCE_SIZE] = std::array::from_fn(|_| rng.random());
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow!("Encryption failed: {e}"))?;

    Ok((nonce_bytes.to_vec(), ciphertext))
}

fn decrypt_aes_gcm(nonce_bytes: &[u8], ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Invalid key size: expected {KEY_SIZE}, got {}", key.len()));
    }
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!("Invalid nonce size"));
    }

    let key = Key::<Aes256Gcm>::from_slice(key);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {e}"))
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(FIELD_PREFIX)
}

pub fn encrypt_field(plaintext: &str, key: &[u8]) -> Result<String> {
    if is_encrypted(plaintext) {
        return Ok(plaintext.to_string());
    }
    let (nonce, ciphertext) = encrypt_aes_gcm(plaintext.as_bytes(), key)?;
    Ok(format!(
        "{FIELD_PREFIX}{}:{}",
        BASE64.encode(nonce),
        BASE64.encode(ciphertext)
    ))
}

pub fn decrypt_field(encrypted: &str, key: &[u8]) -> Result<String> {
    let Some(body) = encrypted.strip_prefix(FIELD_PREFIX) else {
        return Ok(encrypted.to_string());
    };

    let (nonce_b64, ciphertext_b64) = body
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid encrypted field format"))?;

    let nonce = BASE64
        .decode(nonce_b64)
        .map_err(|e| anyhow!("Invalid nonce encoding: {e}"))?;
    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| anyhow!("Invalid ciphertext encoding: {e}"))?;

    let decrypted = decrypt_aes_gcm(&nonce, &ciphertext, key)?;
    String::from_utf8(decrypted).map_err(|e| anyhow!("Invalid UTF-8: {e}"))
}

/// Binary variant used for backup archives: `nonce || ciphertext`.
pub fn encrypt_bytes(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let (mut nonce, ciphertext) = encrypt_aes_gcm(plaintext, key)?;
    nonce.extend_from_slice(&ciphertext);
    Ok(nonce)
}

pub fn decrypt_bytes(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE {
        return Err(anyhow!("Encrypted payload too short"));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    decrypt_aes_gcm(nonce, ciphertext, key)
}

/// Cipher bound to the configured key, shared through `AppState`.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; KEY_SIZE],
}

impl FieldCipher {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        encrypt_field(plaintext, &self.key)
    }

    pub fn decrypt(&self, value: &str) -> Result<String> {
        decrypt_field(value, &self.key)
    }

    /// Deterministic keyed digest of `value` for equality lookups on
    /// encrypted columns. Surrounding whitespace is ignored.
    pub fn blind_index(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(b"blind-index:");
        hasher.update(value.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt_bytes(plaintext, &self.key)
    }

    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        decrypt_bytes(data, &self.key)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").field("key", &"[REDACTED]").finish()
    }
}
