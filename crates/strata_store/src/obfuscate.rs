//! XOR obfuscation of stored values.
//!
//! Values are masked with a fixed-length XOR key before they reach the
//! native engine, so raw store files do not contain recognizable plaintext.
//! This is not cryptographic protection.
//!
//! The key itself lives in the store under a reserved null-prefixed key and
//! is always written unobfuscated; it could not otherwise be read back to
//! bootstrap decoding.

use crate::error::{StoreError, StoreResult};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Length of the obfuscation key in bytes.
pub const OBFUSCATION_KEY_LEN: usize = 8;

/// Reserved store key holding the obfuscation key.
///
/// Null-prefixed to avoid collisions with caller-chosen keys.
pub(crate) const OBFUSCATION_KEY_KEY: &[u8] = b"\x00obfuscate_key";

/// A fixed-length XOR mask applied to stored values.
///
/// Applying the mask twice with the same key restores the original bytes.
/// An all-zero key is the identity and means obfuscation is disabled, but
/// it is still applied so that obfuscated and non-obfuscated stores share
/// one code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Obfuscation {
    key: [u8; OBFUSCATION_KEY_LEN],
}

impl Obfuscation {
    /// Creates the disabled (all-zero, identity) obfuscation.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            key: [0; OBFUSCATION_KEY_LEN],
        }
    }

    /// Creates an obfuscation with a freshly generated random key.
    #[must_use]
    pub fn random() -> Self {
        let mut key = [0u8; OBFUSCATION_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Creates an obfuscation from a stored key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `bytes` is not exactly
    /// [`OBFUSCATION_KEY_LEN`] bytes. An empty key in particular is
    /// rejected here.
    pub fn from_slice(bytes: &[u8]) -> StoreResult<Self> {
        let key: [u8; OBFUSCATION_KEY_LEN] = bytes.try_into().map_err(|_| {
            StoreError::config(format!(
                "obfuscation key must be {OBFUSCATION_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Returns true if the key is non-zero.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.key.iter().any(|b| *b != 0)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    /// XORs `data` in place with the key, repeating the key as needed.
    ///
    /// This operation is its own inverse.
    pub fn apply(&self, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= self.key[i % OBFUSCATION_KEY_LEN];
        }
    }
}

impl fmt::Display for Obfuscation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.key {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
