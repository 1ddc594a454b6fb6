use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};

/// Lowercase hex SHA-1 of `payload`.
pub fn content_digest(payload: &[u8]) -> String {
    hex::encode(digest(&SHA1_FOR_LEGACY_USE_ONLY, payload))
}

/// True for exactly 40 lowercase hex characters, the shape `content_digest`
/// produces.
pub fn is_hex_digest(candidate: &str) -> bool {
    candidate.len() == 40
        && !candidate.bytes().any(|b| b.is_ascii_uppercase())
        && hex::decode(candidate).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_hello() {
        assert_eq!(
            content_digest(b"hello"),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn digest_shape() {
        assert!(is_hex_digest(&content_digest(b"")));
        assert!(!is_hex_digest("AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D"));
        assert!(!is_hex_digest("../../etc/passwd"));
        assert!(!is_hex_digest("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434"));
        assert!(!is_hex_digest("gaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"));
    }
}
