use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Discriminator prefix carried by every plaintext API key.
pub const API_KEY_PREFIX: &str = "hab_live_";

/// Generate a fresh API key: `hab_live_` + base64url of 24 random bytes.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{API_KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 hex of a plaintext key — the only form that is ever stored.
pub fn hash_api_key(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Truncate a key hash for display and logging.
pub fn truncate_hash(hash: &str) -> String {
    if hash.len() <= 16 {
        hash.to_string()
    } else {
        format!("{}...", &hash[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_carry_the_prefix_and_differ() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with(API_KEY_PREFIX));
        assert_ne!(a, b);
        // 24 bytes -> 32 base64url chars.
        assert_eq!(a.len(), API_KEY_PREFIX.len() + 32);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        let hash = hash_api_key("hab_live_test");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_api_key("hab_live_test"));
    }

    #[test]
    fn test_truncate_hash() {
        assert_eq!(truncate_hash("short"), "short");
        let hash = "a".repeat(64);
        assert_eq!(truncate_hash(&hash), format!("{}...", "a".repeat(16)));
    }
}
