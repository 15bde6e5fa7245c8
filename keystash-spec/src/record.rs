use crate::types::Digest;
use crate::version::Version;

/// Persisted, immutable secret record uniquely identified by `(name, version)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub version: Version,
    /// Serialized [`crate::wire::EncryptedObject`].
    pub contents: Vec<u8>,
    /// Wrapped key material as returned by the key wrapper.
    pub key: Vec<u8>,
    /// HMAC over `contents`.
    pub hmac: Vec<u8>,
    pub digest: Digest,
}

impl SecretRecord {
    pub fn id(&self) -> RecordId {
        RecordId {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// `(name, version)` pair identifying a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub name: String,
    pub version: Version,
}

impl RecordId {
    pub fn new(name: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Decrypted payload of one version of a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedPlaintext {
    pub version: Version,
    pub secret: Vec<u8>,
}
