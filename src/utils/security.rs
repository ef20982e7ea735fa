//! # Password Hashing
//!
//! Argon2i key derivation over `(password, salt)` with base64 output, plus
//! random salt generation.
//!
//! The salt is handled as the base64 text stored in the credential row; its
//! bytes are fed to Argon2 as-is. The same inputs always produce the same hash
//! string, so verification is a plain comparison against the stored value.
//!
//! ## Security
//! - Memory-hard parameters (64 MiB, two passes by default)
//! - Salts come from the thread-local CSPRNG
//! - Raw hash bytes are zeroed after encoding
//! - Hash comparison is constant-time (`subtle`)

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::SecurityConfig;
use crate::error::{ProtocolError, Result};

/// Argon2 cost parameters and salt size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub t_cost: u32,
    pub m_cost_kib: u32,
    pub lanes: u32,
    pub output_len: usize,
    pub salt_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            t_cost: 2,
            m_cost_kib: 1 << 16,
            lanes: 1,
            output_len: 32,
            salt_len: 16,
        }
    }
}

impl From<&SecurityConfig> for HashParams {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            t_cost: config.t_cost,
            m_cost_kib: config.m_cost_kib,
            lanes: config.lanes,
            output_len: config.output_len,
            salt_len: config.salt_len,
        }
    }
}

/// Hashing utility shared by the server and the account tool
#[derive(Debug, Clone)]
pub struct Security {
    params: HashParams,
}

impl Security {
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HashParams {
        &self.params
    }

    /// Derive the base64 hash of `password` under `salt`
    pub fn hash(&self, password: &str, salt: &str) -> Result<String> {
        let params = Params::new(
            self.params.m_cost_kib,
            self.params.t_cost,
            self.params.lanes,
            Some(self.params.output_len),
        )
        .map_err(|e| ProtocolError::SecurityError(format!("invalid Argon2 parameters: {e}")))?;

        let argon = Argon2::new(Algorithm::Argon2i, Version::V0x13, params);
        let mut raw = Zeroizing::new(vec![0u8; self.params.output_len]);
        argon
            .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut raw)
            .map_err(|e| ProtocolError::SecurityError(format!("hashing failed: {e}")))?;

        Ok(STANDARD.encode(raw.as_slice()))
    }

    /// Hash `password` and compare against `expected`
    pub fn verify(&self, password: &str, salt: &str, expected: &str) -> Result<bool> {
        let computed = self.hash(password, salt)?;
        Ok(computed.as_bytes().ct_eq(expected.as_bytes()).into())
    }

    /// Fresh random salt, base64 encoded
    pub fn generate_salt(&self) -> String {
        let mut bytes = Zeroizing::new(vec![0u8; self.params.salt_len]);
        rand::rng().fill_bytes(&mut bytes);
        STANDARD.encode(bytes.as_slice())
    }
}

impl Default for Security {
    fn default() -> Self {
        Self::new(HashParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Security {
        Security::new(HashParams {
            t_cost: 1,
            m_cost_kib: 8,
            ..HashParams::default()
        })
    }

    #[test]
    fn test_hash_is_deterministic() {
        let security = cheap();
        let a = security.hash("hunter2", "c2FsdHNhbHRzYWx0").expect("hash");
        let b = security.hash("hunter2", "c2FsdHNhbHRzYWx0").expect("hash");
        assert_eq!(a, b);
        // 32 raw bytes -> 44 base64 characters
        assert_eq!(a.len(), 44);
    }

    #[test]
    fn test_hash_depends_on_password_and_salt() {
        let security = cheap();
        let base = security.hash("hunter2", "c2FsdHNhbHRzYWx0").expect("hash");
        assert_ne!(base, security.hash("hunter3", "c2FsdHNhbHRzYWx0").expect("hash"));
        assert_ne!(base, security.hash("hunter2", "b3RoZXJzYWx0c2FsdA").expect("hash"));
    }

    #[test]
    fn test_verify() {
        let security = cheap();
        let salt = security.generate_salt();
        let stored = security.hash("secret", &salt).expect("hash");
        assert!(security.verify("secret", &salt, &stored).expect("verify"));
        assert!(!security.verify("Secret", &salt, &stored).expect("verify"));
    }

    #[test]
    fn test_verify_rejects_mismatched_stored_hash() {
        let security = cheap();
        let salt = security.generate_salt();
        let stored = security.hash("secret", &salt).expect("hash");

        // Truncated, extended and empty stored values never match
        assert!(!security.verify("secret", &salt, &stored[..stored.len() - 1]).expect("verify"));
        assert!(!security.verify("secret", &salt, &format!("{stored}A")).expect("verify"));
        assert!(!security.verify("secret", &salt, "").expect("verify"));
    }

    #[test]
    fn test_salts_are_random_and_sized() {
        let security = cheap();
        let a = security.generate_salt();
        let b = security.generate_salt();
        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(&a).expect("base64").len(), 16);
    }

    #[test]
    fn test_short_salt_is_rejected() {
        let security = cheap();
        assert!(matches!(
            security.hash("pw", "abc"),
            Err(ProtocolError::SecurityError(_))
        ));
    }
}
