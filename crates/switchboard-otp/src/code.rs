// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code generation and salted hashing.
//!
//! Stored form: `hex(salt)$hex(HMAC-SHA256(secret, salt || code))`. The
//! plaintext exists only in the create call and in the queued send job.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;

/// A fresh six-digit code, uniform over 100000..=999999.
pub fn generate_code() -> String {
    OsRng.gen_range(100_000..=999_999u32).to_string()
}

fn mac(secret: &str, salt: &[u8], code: &str) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(salt);
    mac.update(code.as_bytes());
    Some(mac)
}

/// Hash `code` under a random salt.
pub fn hash_code(secret: &str, code: &str) -> Option<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let tag = mac(secret, &salt, code)?.finalize().into_bytes();
    Some(format!("{}${}", hex::encode(salt), hex::encode(tag)))
}

/// Constant-time check of `code` against a stored hash. Malformed hashes
/// never match.
pub fn verify_code(secret: &str, stored: &str, code: &str) -> bool {
    let Some((salt_hex, tag_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(tag)) = (hex::decode(salt_hex), hex::decode(tag_hex)) else {
        return false;
    };
    match mac(secret, &salt, code.trim()) {
        Some(mac) => mac.verify_slice(&tag).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn hash_verifies_only_the_original_code() {
        let stored = hash_code("secret", "123456").unwrap();
        assert!(!stored.contains("123456"));
        assert!(verify_code("secret", &stored, "123456"));
        assert!(verify_code("secret", &stored, " 123456 "));
        assert!(!verify_code("secret", &stored, "123457"));
        assert!(!verify_code("other-secret", &stored, "123456"));
    }

    #[test]
    fn same_code_hashes_differently() {
        let a = hash_code("secret", "123456").unwrap();
        let b = hash_code("secret", "123456").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_code("secret", "", "123456"));
        assert!(!verify_code("secret", "nodollar", "123456"));
        assert!(!verify_code("secret", "zz$zz", "123456"));
    }
}
