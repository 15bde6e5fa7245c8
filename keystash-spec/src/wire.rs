//! Canonical binary schema shared by every keystash implementation.
//!
//! Both messages are protobuf (proto2) so independently written clients
//! produce and accept byte-identical encodings:
//!
//! ```text
//! enum Digest { sha256 = 1; sha512 = 2; md5 = 3; }
//!
//! message Secret {
//!   required string name = 1;
//!   required string version = 2;
//!   required bytes contents = 3;
//!   required bytes key = 4;
//!   required bytes hmac = 5;
//!   required Digest digest = 6;
//! }
//!
//! message EncryptedObject {
//!   required bytes ciphertext = 1;
//!   optional bytes iv = 2;
//!   optional bytes tag = 3;
//! }
//! ```

use crate::error::StoreError;
use crate::record::SecretRecord;
use crate::types::Digest;
use prost::Message;

/// Cipher output stored in a record's `contents`.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct EncryptedObject {
    #[prost(bytes = "vec", required, tag = "1")]
    pub ciphertext: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub iv: Option<Vec<u8>>,
    /// Present only for AEAD modes.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub tag: Option<Vec<u8>>,
}

impl EncryptedObject {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}

/// Serialized form of a [`SecretRecord`], used as an object body.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct StoredSecret {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(string, required, tag = "2")]
    pub version: String,
    #[prost(bytes = "vec", required, tag = "3")]
    pub contents: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "4")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", required, tag = "5")]
    pub hmac: Vec<u8>,
    #[prost(enumeration = "Digest", required, tag = "6")]
    pub digest: i32,
}

impl From<&SecretRecord> for StoredSecret {
    fn from(record: &SecretRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.to_string(),
            contents: record.contents.clone(),
            key: record.key.clone(),
            hmac: record.hmac.clone(),
            digest: record.digest as i32,
        }
    }
}

impl TryFrom<StoredSecret> for SecretRecord {
    type Error = StoreError;

    fn try_from(value: StoredSecret) -> Result<Self, Self::Error> {
        let digest = Digest::try_from(value.digest).map_err(|_| {
            StoreError::Malformed(format!(
                "{} has unknown digest value {}",
                value.name, value.digest
            ))
        })?;
        Ok(SecretRecord {
            name: value.name,
            version: value.version.into(),
            contents: value.contents,
            key: value.key,
            hmac: value.hmac,
            digest,
        })
    }
}

/// Encode a record as a `Secret` message.
pub fn encode_record(record: &SecretRecord) -> Vec<u8> {
    StoredSecret::from(record).encode_to_vec()
}

/// Decode a `Secret` message into a record.
pub fn decode_record(bytes: &[u8]) -> Result<SecretRecord, StoreError> {
    let stored = StoredSecret::decode(bytes)
        .map_err(|err| StoreError::Malformed(format!("decode secret: {err}")))?;
    SecretRecord::try_from(stored)
}
