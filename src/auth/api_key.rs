//! Per-user API keys
//!
//! Keys look like `sk_` followed by 48 lowercase hex characters. Only the
//! SHA-256 hex digest of a key is ever stored.

use sha2::{Digest, Sha256};
use std::fmt::Write;

pub const API_KEY_PREFIX: &str = "sk_";
const API_KEY_BYTES: usize = 24;

pub fn generate_api_key() -> String {
    let bytes: [u8; API_KEY_BYTES] = rand::random();
    let mut key = String::with_capacity(API_KEY_PREFIX.len() + API_KEY_BYTES * 2);
    key.push_str(API_KEY_PREFIX);
    for byte in bytes {
        let _ = write!(key, "{:02x}", byte);
    }
    key
}

pub fn hash_api_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

pub fn is_well_formed(key: &str) -> bool {
    key.strip_prefix(API_KEY_PREFIX).is_some_and(|hex| {
        hex.len() == API_KEY_BYTES * 2 && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_well_formed_and_distinct() {
        let a = generate_api_key();
        let b = generate_api_key();

        assert!(is_well_formed(&a), "bad key: {}", a);
        assert_eq!(a.len(), 51);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_api_key("sk_test");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key("sk_test"));
        assert_ne!(hash, hash_api_key("sk_other"));
    }

    #[test]
    fn test_malformed_keys() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("sk_abc"));
        assert!(!is_well_formed(&format!("pk_{}", "a".repeat(48))));
        assert!(!is_well_formed(&format!("sk_{}", "z".repeat(48))));
    }
}
