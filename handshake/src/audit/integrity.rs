//! Hashing helpers for ledger entries. Unkeyed ledgers chain plain SHA-256
//! digests; keyed ledgers chain HMAC-SHA256 tags so the chain cannot be
//! rebuilt without the key.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// Shortest accepted ledger key, in bytes.
pub const MIN_KEY_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("ledger key is not valid hex: {0}")]
    KeyNotHex(String),
    #[error("ledger key too short; expected at least {MIN_KEY_LEN} bytes, got {0}")]
    KeyTooShort(usize),
    #[error("hmac failed: {0}")]
    HmacFailed(String),
}

type HmacSha256 = Hmac<Sha256>;

/// Returns the hexadecimal representation of a SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Returns the hex HMAC-SHA256 tag of `data`.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> Result<String, IntegrityError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| IntegrityError::HmacFailed(format!("{e}")))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Decodes a hex ledger key and checks its length.
pub fn parse_key(raw: &str) -> Result<Vec<u8>, IntegrityError> {
    let bytes = hex::decode(raw.trim()).map_err(|e| IntegrityError::KeyNotHex(format!("{e}")))?;
    if bytes.len() < MIN_KEY_LEN {
        return Err(IntegrityError::KeyTooShort(bytes.len()));
    }
    Ok(bytes)
}

/// Selects the digest used to seal ledger entries.
#[derive(Clone)]
pub enum Sealer {
    Sha256,
    Hmac(Vec<u8>),
}

impl Sealer {
    pub fn seal(&self, payload: &[u8]) -> Result<String, IntegrityError> {
        match self {
            Sealer::Sha256 => Ok(sha256_hex(payload)),
            Sealer::Hmac(key) => hmac_sha256_hex(key, payload),
        }
    }
}

impl Drop for Sealer {
    fn drop(&mut self) {
        if let Sealer::Hmac(key) = self {
            key.zeroize();
        }
    }
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sealer::Sha256 => f.write_str("Sha256"),
            Sealer::Hmac(_) => f.write_str("Hmac(<redacted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_to_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn builds_hmac() {
        assert_eq!(
            hmac_sha256_hex(b"key", b"The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn parses_hex_keys() {
        let key = parse_key("00112233445566778899aabbccddeeff").expect("valid key");
        assert_eq!(key.len(), 16);
        assert!(matches!(parse_key("zz"), Err(IntegrityError::KeyNotHex(_))));
        assert!(matches!(parse_key("0011"), Err(IntegrityError::KeyTooShort(2))));
    }

    #[test]
    fn keyed_and_unkeyed_seals_differ() {
        let plain = Sealer::Sha256.seal(b"payload").unwrap();
        let keyed = Sealer::Hmac(vec![7u8; 16]).seal(b"payload").unwrap();
        assert_eq!(plain.len(), 64);
        assert_eq!(keyed.len(), 64);
        assert_ne!(plain, keyed);
        assert!(!format!("{:?}", Sealer::Hmac(vec![7u8; 16])).contains('7'));
    }
}
