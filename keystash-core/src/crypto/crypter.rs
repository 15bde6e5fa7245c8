use super::cipher::{AesCtr, AesGcm, CipherMode, OpenError};
use super::mac;
use keystash_spec::{
    Algorithm, Digest, EncryptedObject, Error, KeyMaterial, PlaintextKey, Result, SecretRecord,
    Version,
};
use rand::RngCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ctr,
    Gcm,
}

/// Symmetric encryption plus HMAC over the serialized cipher output.
///
/// The mode is fixed when the crypter is built; encrypt and decrypt never
/// branch on the algorithm name.
#[derive(Debug, Clone, Copy)]
pub struct Crypter {
    algorithm: Algorithm,
    mode: Mode,
}

/// Encrypted contents and their authentication data, ready to become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub contents: Vec<u8>,
    pub hmac: Vec<u8>,
    /// Wrapped key material, copied from the [`KeyMaterial`] used.
    pub key: Vec<u8>,
    pub digest: Digest,
}

impl Sealed {
    pub fn into_record(self, name: impl Into<String>, version: Version) -> SecretRecord {
        SecretRecord {
            name: name.into(),
            version,
            contents: self.contents,
            key: self.key,
            hmac: self.hmac,
            digest: self.digest,
        }
    }
}

impl Default for Crypter {
    fn default() -> Self {
        Self::new(Algorithm::default())
    }
}

impl Crypter {
    pub fn new(algorithm: Algorithm) -> Self {
        let mode = match algorithm {
            Algorithm::Aes256Ctr => Mode::Ctr,
            Algorithm::Aes256Gcm => Mode::Gcm,
        };
        Self { algorithm, mode }
    }

    /// Build from an algorithm name such as `aes-256-gcm`.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// IV length required by the configured mode.
    pub fn iv_len(&self) -> usize {
        match self.mode {
            Mode::Ctr => AesCtr::IV_LEN,
            Mode::Gcm => AesGcm::IV_LEN,
        }
    }

    /// Encrypt `data` under the data key half of `key` and authenticate the
    /// serialized result with the HMAC half. A random IV is drawn when none
    /// is supplied.
    pub fn encrypt(
        &self,
        data: &[u8],
        digest: Digest,
        key: &KeyMaterial,
        iv: Option<&[u8]>,
    ) -> Result<Sealed> {
        if data.is_empty() {
            return Err(Error::validation("secret must not be empty"));
        }
        let iv = match iv {
            Some(iv) if iv.len() != self.iv_len() => {
                return Err(Error::validation(format!(
                    "{} requires a {} byte iv, got {}",
                    self.algorithm,
                    self.iv_len(),
                    iv.len()
                )));
            }
            Some(iv) => iv.to_vec(),
            None => random_bytes(self.iv_len()),
        };

        let data_key = key.plaintext.data_key();
        let object = match self.mode {
            Mode::Ctr => AesCtr::seal(data_key, &iv, data),
            Mode::Gcm => AesGcm::seal(data_key, &iv, data),
        }
        .map_err(Error::Crypto)?;

        let contents = object.to_bytes();
        let hmac = mac::compute(digest, key.plaintext.hmac_key(), &contents)?;
        Ok(Sealed {
            contents,
            hmac,
            key: key.wrapped.clone(),
            digest,
        })
    }

    /// Verify the record's HMAC and only then decrypt its contents.
    pub fn decrypt(&self, record: &SecretRecord, key: &PlaintextKey) -> Result<Vec<u8>> {
        if !mac::verify(record.digest, key.hmac_key(), &record.contents, &record.hmac)? {
            return Err(Error::Integrity {
                name: record.name.clone(),
            });
        }

        let object = EncryptedObject::from_bytes(&record.contents)
            .map_err(|err| Error::Crypto(format!("decode contents of {}: {err}", record.name)))?;
        let opened = match self.mode {
            Mode::Ctr => AesCtr::open(key.data_key(), &object),
            Mode::Gcm => AesGcm::open(key.data_key(), &object),
        };
        match opened {
            Ok(plaintext) => Ok(plaintext),
            Err(OpenError::Authentication) => Err(Error::Integrity {
                name: record.name.clone(),
            }),
            Err(OpenError::Malformed(reason)) => Err(Error::Crypto(format!(
                "{} contents are not valid {}: {reason}",
                record.name, self.algorithm
            ))),
        }
    }
}

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}
