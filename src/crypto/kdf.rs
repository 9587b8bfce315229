//! Passphrase-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The salt is a fixed public value compiled into the binary.  It only
//! defeats precomputed tables; it is not a secret.  Changing the salt or
//! the iteration count makes every existing `.portwarden` file unreadable.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

/// Fixed salt shared by every backup file.
pub const SALT: &[u8] = b",(@0vd<)D6c3:5jI;4BZ(#Gx2IZ6B>";

/// PBKDF2 iteration count.
pub const ITERATIONS: u32 = 4096;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// A 32-byte symmetric key that zeroes its memory when dropped.
///
/// Deliberately not `Debug`, `Clone` or serializable.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

/// Derive the backup key from a passphrase.
///
/// Deterministic for a given passphrase.  Any string is accepted,
/// including the empty one; rejecting empty passphrases is up to the caller.
pub fn derive(passphrase: &str) -> DerivedKey {
    let mut bytes = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), SALT, ITERATIONS, &mut bytes);
    let key = DerivedKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive("secret");
        let b = derive("secret");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn derive_matches_known_vector() {
        // Keys produced by earlier releases must still open their backups.
        assert_eq!(
            hex(derive("secret").as_bytes()),
            "6d9cda5bc064273741aff76372670f62cf2c621d0bd0f697ae6a0f7a0a73b896"
        );
    }

    #[test]
    fn empty_passphrase_is_accepted() {
        assert_eq!(
            hex(derive("").as_bytes()),
            "d0963558f0199c760c286387b3d4a53fccb79f980bad67a45ecf5ab52e8b390d"
        );
    }

    #[test]
    fn different_passphrases_give_different_keys() {
        assert_ne!(derive("one").as_bytes(), derive("two").as_bytes());
    }
}
