//! Utility functions for quorumkv

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Percent-encoding set for keys in URL paths (includes /, %, and control chars)
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Maximum key length, in bytes
pub const MAX_KEY_LEN: usize = 1024;

/// Encode a key for use as a single URL path segment
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// Join a peer base URL and a path without doubling slashes
pub fn peer_url(peer: &str, path: &str) -> String {
    format!("{}{}", peer.trim_end_matches('/'), path)
}

/// Validate key (must be non-empty, reasonable length)
pub fn validate_key(key: &str) -> crate::Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InvalidKey("key cannot be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(crate::Error::InvalidKey(format!(
            "key too long (max {} bytes)",
            MAX_KEY_LEN
        )));
    }

    if key.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidKey(
            "key contains invalid characters".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key() {
        let encoded = encode_key("my/path to?key");
        assert_eq!(encoded, "my%2Fpath%20to%3Fkey");
        assert_eq!(encode_key("plain-key_1"), "plain-key_1");
    }

    #[test]
    fn test_peer_url() {
        assert_eq!(
            peer_url("http://node2:8080/", "/replicate"),
            "http://node2:8080/replicate"
        );
        assert_eq!(
            peer_url("http://node2:8080", "/local_read/k"),
            "http://node2:8080/local_read/k"
        );
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("normal-key").is_ok());
        assert!(validate_key("path/to/key").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(&"x".repeat(2000)).is_err());
        assert!(validate_key("bad\nkey").is_err());
    }
}
