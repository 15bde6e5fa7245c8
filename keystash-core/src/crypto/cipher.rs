use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Aes256Gcm;
use ctr::cipher::{KeyIvInit, StreamCipher};
use keystash_spec::EncryptedObject;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Failure opening an [`EncryptedObject`].
#[derive(Debug)]
pub(crate) enum OpenError {
    /// The object does not have the shape the mode expects.
    Malformed(String),
    /// The AEAD tag did not authenticate the ciphertext.
    Authentication,
}

/// One symmetric mode. Each implementation fixes its IV length and whether it
/// produces a tag.
pub(crate) trait CipherMode {
    const IV_LEN: usize;
    const TAG_LEN: Option<usize>;

    /// Encrypt `plaintext` under `key`. `iv` is exactly [`Self::IV_LEN`] bytes.
    fn seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<EncryptedObject, String>;

    fn open(key: &[u8], object: &EncryptedObject) -> Result<Vec<u8>, OpenError>;
}

/// AES-256 in big-endian counter mode. No tag.
pub(crate) struct AesCtr;

/// AES-256-GCM with a detached 16 byte tag and no associated data.
pub(crate) struct AesGcm;

impl CipherMode for AesCtr {
    const IV_LEN: usize = 16;
    const TAG_LEN: Option<usize> = None;

    fn seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<EncryptedObject, String> {
        let mut cipher = Aes256Ctr::new_from_slices(key, iv).map_err(|err| err.to_string())?;
        let mut buffer = plaintext.to_vec();
        cipher.apply_keystream(&mut buffer);
        Ok(EncryptedObject {
            ciphertext: buffer,
            iv: Some(iv.to_vec()),
            tag: None,
        })
    }

    fn open(key: &[u8], object: &EncryptedObject) -> Result<Vec<u8>, OpenError> {
        let iv = expect_iv::<Self>(object)?;
        let mut cipher = Aes256Ctr::new_from_slices(key, iv)
            .map_err(|err| OpenError::Malformed(err.to_string()))?;
        let mut buffer = object.ciphertext.clone();
        cipher.apply_keystream(&mut buffer);
        Ok(buffer)
    }
}

impl CipherMode for AesGcm {
    const IV_LEN: usize = 12;
    const TAG_LEN: Option<usize> = Some(16);

    #[allow(deprecated)]
    fn seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<EncryptedObject, String> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|err| err.to_string())?;
        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(iv), b"", &mut buffer)
            .map_err(|_| "aes-gcm encryption failed".to_string())?;
        Ok(EncryptedObject {
            ciphertext: buffer,
            iv: Some(iv.to_vec()),
            tag: Some(tag.to_vec()),
        })
    }

    #[allow(deprecated)]
    fn open(key: &[u8], object: &EncryptedObject) -> Result<Vec<u8>, OpenError> {
        let iv = expect_iv::<Self>(object)?;
        let tag = match (&object.tag, Self::TAG_LEN) {
            (Some(tag), Some(len)) if tag.len() == len => tag,
            _ => return Err(OpenError::Malformed("missing or truncated tag".into())),
        };
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|err| OpenError::Malformed(err.to_string()))?;
        let mut buffer = object.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| OpenError::Authentication)?;
        Ok(buffer)
    }
}

fn expect_iv<M: CipherMode>(object: &EncryptedObject) -> Result<&[u8], OpenError> {
    match object.iv.as_deref() {
        Some(iv) if iv.len() == M::IV_LEN => Ok(iv),
        Some(iv) => Err(OpenError::Malformed(format!(
            "iv must be {} bytes, got {}",
            M::IV_LEN,
            iv.len()
        ))),
        None => Err(OpenError::Malformed("missing iv".into())),
    }
}
