//! Cryptographic primitives for Portwarden.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 passphrase key derivation (`kdf`)
//! - AES-256-GCM encryption and decryption of backup payloads (`encryption`)

pub mod encryption;
pub mod kdf;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive, ...};
pub use encryption::{decrypt, decrypt_with_passphrase, encrypt, encrypt_with_passphrase};
pub use kdf::{derive, DerivedKey};
