use crate::error::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Caller-supplied associated data bound to wrapped key material.
///
/// Ordered so that every serialization of a context is identical.
pub type EncryptionContext = BTreeMap<String, String>;

/// HMAC digest used to authenticate a record's encrypted contents.
///
/// Discriminants are the wire values of the `Digest` enum in the record schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
#[repr(i32)]
pub enum Digest {
    Sha256 = 1,
    Sha512 = 2,
    /// Legacy compatibility only.
    Md5 = 3,
}

impl Digest {
    pub const ALL: [Digest; 3] = [Digest::Sha256, Digest::Sha512, Digest::Md5];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Md5 => "MD5",
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "md5" => Ok(Self::Md5),
            other => Err(Error::Configuration(format!("unsupported digest: {other}"))),
        }
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.as_str().to_string()
    }
}

/// Symmetric cipher used for secret contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum Algorithm {
    /// AES-256 in counter mode; integrity comes from the record HMAC alone.
    #[default]
    Aes256Ctr,
    /// AES-256-GCM; the cipher tag is checked in addition to the record HMAC.
    Aes256Gcm,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Aes256Ctr, Algorithm::Aes256Gcm];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes256Ctr => "aes-256-ctr",
            Self::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-256-ctr" | "aes256ctr" => Ok(Self::Aes256Ctr),
            "aes-256-gcm" | "aes256gcm" => Ok(Self::Aes256Gcm),
            other => Err(Error::Configuration(format!(
                "unsupported algorithm: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.as_str().to_string()
    }
}
