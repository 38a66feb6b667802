/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum CryptoError {
    #[error("Encryption key must be exactly 32 bytes (got {0})")]
    InvalidKeyLength(usize),
    #[error("Encryption failed")]
    EncryptionFailed,
}

/// `ENCRYPTION_KEY` is accepted as 64 hex characters or 32 raw bytes.
/// Length is checked here, at startup, rather than on first write.
pub fn parse_encryption_key(raw: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        hex::decode(raw).unwrap_or_default()
    } else {
        raw.as_bytes().to_vec()
    };

    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))
}

/// AES-256-GCM with a random 12-byte nonce. Storage form is
/// `nonce_hex:tag_hex:ciphertext_hex`.
pub fn encrypt_value(key: &[u8; 32], plaintext: &str) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(nonce),
        hex::encode(tag),
        hex::encode(ciphertext)
    ))
}

/// Reverses `encrypt_value`. Values that do not parse as
/// `nonce:tag:ciphertext` or fail tag verification are treated as literal
/// plaintext, which keeps rows from before encryption was introduced
/// readable.
pub fn decrypt_value(key: &[u8; 32], stored: &str) -> String {
    match try_decrypt(key, stored) {
        Some(plaintext) => plaintext,
        None => stored.to_string(),
    }
}

fn try_decrypt(key: &[u8; 32], stored: &str) -> Option<String> {
    let mut parts = stored.split(':');
    let nonce = hex::decode(parts.next()?).ok()?;
    let tag = hex::decode(parts.next()?).ok()?;
    let ciphertext = hex::decode(parts.next()?).ok()?;

    if parts.next().is_some() || nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return None;
    }

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
        .ok()?;

    String::from_utf8(plaintext).ok()
}
