use crate::error::{Error, KeyWrapResult, Result};
use crate::types::EncryptionContext;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Length of the plaintext key material minted per secret.
pub const KEY_MATERIAL_LEN: usize = 64;
/// Length of each half of the key material.
pub const DATA_KEY_LEN: usize = 32;

/// Unwrapped key material: a data key followed by an HMAC key.
///
/// Zeroed on drop and never printed.
#[derive(Clone)]
pub struct PlaintextKey(Zeroizing<Vec<u8>>);

impl PlaintextKey {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() != KEY_MATERIAL_LEN {
            return Err(Error::validation(format!(
                "key material must be {KEY_MATERIAL_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Symmetric key for the secret contents, bytes `[0, 32)`.
    pub fn data_key(&self) -> &[u8] {
        &self.0[..DATA_KEY_LEN]
    }

    /// Key authenticating the serialized contents, bytes `[32, 64)`.
    pub fn hmac_key(&self) -> &[u8] {
        &self.0[DATA_KEY_LEN..]
    }
}

impl fmt::Debug for PlaintextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlaintextKey(..)")
    }
}

/// Freshly minted key material together with its wrapped form.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub plaintext: PlaintextKey,
    /// Opaque blob produced by the wrapping service; persisted as the record key.
    pub wrapped: Vec<u8>,
}

impl KeyMaterial {
    pub fn new(plaintext: PlaintextKey, wrapped: Vec<u8>) -> Self {
        Self { plaintext, wrapped }
    }
}

/// External key-wrapping service minting per-secret key material.
#[async_trait]
pub trait KeyWrapper: Send + Sync {
    /// Identifier of the master key, used in error messages.
    fn key_id(&self) -> &str;

    /// Mint [`KEY_MATERIAL_LEN`] bytes of key material bound to `context`.
    async fn generate_data_key(&self, context: &EncryptionContext) -> KeyWrapResult<KeyMaterial>;

    /// Recover the plaintext of `wrapped`. `context` must equal the one used
    /// when the material was minted.
    async fn unwrap(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> KeyWrapResult<PlaintextKey>;
}

#[async_trait]
impl<T> KeyWrapper for Arc<T>
where
    T: KeyWrapper + ?Sized,
{
    fn key_id(&self) -> &str {
        (**self).key_id()
    }

    async fn generate_data_key(&self, context: &EncryptionContext) -> KeyWrapResult<KeyMaterial> {
        (**self).generate_data_key(context).await
    }

    async fn unwrap(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> KeyWrapResult<PlaintextKey> {
        (**self).unwrap(wrapped, context).await
    }
}

#[async_trait]
impl<T> KeyWrapper for Box<T>
where
    T: KeyWrapper + ?Sized,
{
    fn key_id(&self) -> &str {
        (**self).key_id()
    }

    async fn generate_data_key(&self, context: &EncryptionContext) -> KeyWrapResult<KeyMaterial> {
        (**self).generate_data_key(context).await
    }

    async fn unwrap(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> KeyWrapResult<PlaintextKey> {
        (**self).unwrap(wrapped, context).await
    }
}
