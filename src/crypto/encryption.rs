//! AES-256-GCM authenticated encryption of backup payloads.
//!
//! Each call to `encrypt` draws a fresh random 12-byte nonce from the OS
//! and prepends it to the ciphertext.  `decrypt` splits the nonce back out
//! before opening.
//!
//! Layout of a `.portwarden` file:
//!   [ 12-byte nonce | ciphertext | 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::TryRngCore;

use super::kdf::{self, DerivedKey};
use crate::errors::{PortwardenError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key`.
///
/// Returns `nonce || ciphertext || tag`.  Fails if the OS random number
/// generator cannot be read.
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| PortwardenError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| PortwardenError::EncryptionFailed(format!("OS randomness unavailable: {e}")))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| PortwardenError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt a blob produced by `encrypt`.
///
/// A blob too short to hold a nonce and a tag is `MalformedInput`; any
/// tag mismatch (wrong passphrase, flipped bit) is
/// `CryptoAuthenticationFailure` and no plaintext is returned.
pub fn decrypt(blob: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(PortwardenError::MalformedInput(format!(
            "backup is {} bytes, shorter than the {} byte minimum",
            blob.len(),
            NONCE_LEN + TAG_LEN
        )));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| PortwardenError::EncryptionFailed(format!("invalid key length: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| PortwardenError::CryptoAuthenticationFailure)
}

/// Derive the key from `passphrase` and encrypt.
pub fn encrypt_with_passphrase(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    encrypt(plaintext, &kdf::derive(passphrase))
}

/// Derive the key from `passphrase` and decrypt.
pub fn decrypt_with_passphrase(blob: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    decrypt(blob, &kdf::derive(passphrase))
}
