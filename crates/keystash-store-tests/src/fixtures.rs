use keystash_spec::{Digest, SecretRecord, Version};
use rand::RngCore;

pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    rand::rng().fill_bytes(&mut buf);
    buf
}

pub fn small_payload() -> Vec<u8> {
    random_bytes(16)
}

pub fn medium_payload() -> Vec<u8> {
    random_bytes(1024)
}

/// Opaque record for exercising a store directly. Stores never interpret
/// the encrypted fields, so random bytes stand in for real ciphertext.
pub fn record(name: &str, version: u64) -> SecretRecord {
    SecretRecord {
        name: name.to_string(),
        version: Version::padded(version),
        contents: medium_payload(),
        key: small_payload(),
        hmac: random_bytes(32),
        digest: Digest::Sha256,
    }
}
