use aes_gcm::{aead::Aead, aead::KeyInit, Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand_core::OsRng;
use rand_core::RngCore;

const NONCE_LEN: usize = 12;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption key must be 32 bytes")]
    InvalidKeyLength,
    #[error("failed to encrypt setting")]
    Encrypt,
    #[error("failed to decrypt setting")]
    Decrypt,
    #[error("invalid ciphertext encoding")]
    InvalidEncoding,
    #[error("setting is encrypted but no encryption key is configured")]
    MissingKey,
}

pub fn decode_key(key_b64: &str) -> Result<Vec<u8>, EncryptionError> {
    let decoded = STANDARD
        .decode(key_b64.trim())
        .map_err(|_| EncryptionError::InvalidEncoding)?;
    if decoded.len() != 32 {
        return Err(EncryptionError::InvalidKeyLength);
    }
    Ok(decoded)
}

/// AES-256-GCM, output is base64(nonce || ciphertext).
pub fn encrypt_secret(key: &[u8], plaintext: &str) -> Result<String, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| EncryptionError::Encrypt)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(combined))
}

pub fn decrypt_secret(key: &[u8], ciphertext_b64: &str) -> Result<String, EncryptionError> {
    let data = STANDARD
        .decode(ciphertext_b64)
        .map_err(|_| EncryptionError::InvalidEncoding)?;
    if data.len() <= NONCE_LEN {
        return Err(EncryptionError::InvalidEncoding);
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| EncryptionError::Decrypt)?;
    String::from_utf8(plaintext).map_err(|_| EncryptionError::Decrypt)
}

/// Masks a secret for display, keeping the last four characters.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}
