/// SHA-256 hashing over canonical PoA payloads.
///
/// The hash is always rendered as lowercase hex. It is what gets written
/// on-chain and what verification recomputes, so the encoding here and
/// in `canonical` together define the commitment.
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::canonical;
use crate::error::Result;

/// Compute the PoA hash for an execution payload.
pub fn poa_hash(
    goal: &str,
    url: &str,
    timestamp: &str,
    result_json: Option<&Value>,
) -> Result<String> {
    let bytes = canonical::canonical_bytes(goal, url, timestamp, result_json)?;
    Ok(sha256_hex(&bytes))
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_vector() {
        // sha256 of the canonical form of this exact payload.
        let result = json!({"price": "63481.08"});
        let hash = poa_hash(
            "Extract price",
            "https://example.com",
            "2024-01-01T00:00:00Z",
            Some(&result),
        )
        .unwrap();
        assert_eq!(
            hash,
            "77f4d050a566d4c1146454a2a24925b9f9777a89224b06451f4763e02e58fcc5"
        );
    }

    #[test]
    fn test_deterministic() {
        let result = json!({"a": 1, "b": [true, null]});
        let h1 = poa_hash("g", "u", "t", Some(&result)).unwrap();
        let h2 = poa_hash("g", "u", "t", Some(&result)).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_single_character_change_flips_hash() {
        let original = json!({"price": "63481.08"});
        let tampered = json!({"price": "63481.09"});

        let h1 = poa_hash(
            "Extract price",
            "https://example.com",
            "2024-01-01T00:00:00Z",
            Some(&original),
        )
        .unwrap();
        let h2 = poa_hash(
            "Extract price",
            "https://example.com",
            "2024-01-01T00:00:00Z",
            Some(&tampered),
        )
        .unwrap();

        assert_ne!(h1, h2);
        assert_eq!(
            h2,
            "12239e4f589a66b28d79fcace41d5a146d5c2d05ee726ae171c744e513279413"
        );
    }

    #[test]
    fn test_each_field_contributes() {
        let result = json!({"k": "v"});
        let base = poa_hash("g", "u", "t", Some(&result)).unwrap();

        assert_ne!(poa_hash("G", "u", "t", Some(&result)).unwrap(), base);
        assert_ne!(poa_hash("g", "U", "t", Some(&result)).unwrap(), base);
        assert_ne!(poa_hash("g", "u", "T", Some(&result)).unwrap(), base);
        assert_ne!(poa_hash("g", "u", "t", None).unwrap(), base);
    }

    #[test]
    fn test_sha256_hex_known_digests() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"{}"),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_hash_is_lowercase_hex() {
        let hash = poa_hash("g", "u", "t", None).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
