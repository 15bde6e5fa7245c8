//! In-process key wrapper for tests and local development.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use async_trait::async_trait;
use keystash_spec::{
    EncryptionContext, KEY_MATERIAL_LEN, KeyMaterial, KeyWrapError, KeyWrapResult, KeyWrapper,
    PlaintextKey,
};
use sha2::{Digest as _, Sha256};
use zeroize::Zeroizing;

use crate::crypto::random_bytes;

const NONCE_LEN: usize = 12;

/// Environment variable holding the master key material for
/// [`MemoryKeyWrapper::from_env`].
pub const MASTER_KEY_ENV: &str = "KEYSTASH_MASTER_KEY";

/// Wraps key material with AES-256-GCM under a master key held in memory.
///
/// The encryption context and key id are bound as associated data, so unwrap
/// with a different context fails the same way a remote key service would.
///
/// Wrapped blob layout: `[id len u8][key id][nonce 12][ciphertext + tag]`.
pub struct MemoryKeyWrapper {
    key_id: String,
    master: Zeroizing<[u8; 32]>,
}

impl MemoryKeyWrapper {
    /// Wrapper with a random master key.
    pub fn new(key_id: impl Into<String>) -> Self {
        let mut master = Zeroizing::new([0u8; 32]);
        master.copy_from_slice(&random_bytes(32));
        Self {
            key_id: key_id.into(),
            master,
        }
    }

    /// Derive the master key from arbitrary input via SHA-256.
    pub fn from_material(key_id: impl Into<String>, input: &[u8]) -> Self {
        let mut master = Zeroizing::new([0u8; 32]);
        master.copy_from_slice(&Sha256::digest(input));
        Self {
            key_id: key_id.into(),
            master,
        }
    }

    /// Read master material from `KEYSTASH_MASTER_KEY`, falling back to a
    /// random key when unset.
    pub fn from_env(key_id: impl Into<String>) -> Self {
        match std::env::var(MASTER_KEY_ENV) {
            Ok(material) if !material.is_empty() => {
                Self::from_material(key_id, material.as_bytes())
            }
            _ => Self::new(key_id),
        }
    }

    fn cipher(&self) -> KeyWrapResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.master.as_slice())
            .map_err(|err| KeyWrapError::InvalidMaterial(err.to_string()))
    }

    fn aad(&self, context: &EncryptionContext) -> KeyWrapResult<Vec<u8>> {
        let mut aad = self.key_id.as_bytes().to_vec();
        aad.push(0);
        let canonical = serde_json::to_vec(context)
            .map_err(|err| KeyWrapError::InvalidMaterial(err.to_string()))?;
        aad.extend_from_slice(&canonical);
        Ok(aad)
    }
}

#[async_trait]
impl KeyWrapper for MemoryKeyWrapper {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    #[allow(deprecated)]
    async fn generate_data_key(&self, context: &EncryptionContext) -> KeyWrapResult<KeyMaterial> {
        let id = self.key_id.as_bytes();
        let id_len = u8::try_from(id.len())
            .map_err(|_| KeyWrapError::InvalidMaterial("key id longer than 255 bytes".into()))?;
        let material = Zeroizing::new(random_bytes(KEY_MATERIAL_LEN));
        let nonce = random_bytes(NONCE_LEN);
        let aad = self.aad(context)?;
        let ciphertext = self
            .cipher()?
            .encrypt(
                GenericArray::from_slice(&nonce),
                Payload {
                    msg: material.as_slice(),
                    aad: &aad,
                },
            )
            .map_err(|_| KeyWrapError::InvalidMaterial("wrap failed".into()))?;

        let mut wrapped = Vec::with_capacity(1 + id.len() + NONCE_LEN + ciphertext.len());
        wrapped.push(id_len);
        wrapped.extend_from_slice(id);
        wrapped.extend_from_slice(&nonce);
        wrapped.extend_from_slice(&ciphertext);

        let plaintext = PlaintextKey::new(material.to_vec())
            .map_err(|err| KeyWrapError::InvalidMaterial(err.to_string()))?;
        Ok(KeyMaterial::new(plaintext, wrapped))
    }

    #[allow(deprecated)]
    async fn unwrap(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> KeyWrapResult<PlaintextKey> {
        let (&id_len, rest) = wrapped
            .split_first()
            .ok_or_else(|| KeyWrapError::InvalidMaterial("empty wrapped key".into()))?;
        let id_len = usize::from(id_len);
        if rest.len() < id_len + NONCE_LEN {
            return Err(KeyWrapError::InvalidMaterial("wrapped key truncated".into()));
        }
        let (id, rest) = rest.split_at(id_len);
        if id != self.key_id.as_bytes() {
            return Err(KeyWrapError::NotFound(
                String::from_utf8_lossy(id).into_owned(),
            ));
        }
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let aad = self.aad(context)?;
        let material = self
            .cipher()?
            .decrypt(
                GenericArray::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| KeyWrapError::InvalidContext)?;
        PlaintextKey::new(material).map_err(|err| KeyWrapError::InvalidMaterial(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> EncryptionContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn unwrap_recovers_minted_material() {
        let wrapper = MemoryKeyWrapper::new("alias/test");
        let ctx = context(&[("app", "billing")]);
        let material = wrapper.generate_data_key(&ctx).await.unwrap();
        let recovered = wrapper.unwrap(&material.wrapped, &ctx).await.unwrap();
        assert_eq!(recovered.data_key(), material.plaintext.data_key());
        assert_eq!(recovered.hmac_key(), material.plaintext.hmac_key());
    }

    #[tokio::test]
    async fn different_context_is_rejected() {
        let wrapper = MemoryKeyWrapper::new("alias/test");
        let material = wrapper
            .generate_data_key(&context(&[("app", "billing")]))
            .await
            .unwrap();

        let err = wrapper
            .unwrap(&material.wrapped, &EncryptionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KeyWrapError::InvalidContext));

        let err = wrapper
            .unwrap(&material.wrapped, &context(&[("app", "payroll")]))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyWrapError::InvalidContext));
    }

    #[tokio::test]
    async fn foreign_key_id_is_not_found() {
        let minted = MemoryKeyWrapper::from_material("alias/a", b"seed");
        let other = MemoryKeyWrapper::from_material("alias/b", b"seed");
        let material = minted
            .generate_data_key(&EncryptionContext::new())
            .await
            .unwrap();
        let err = other
            .unwrap(&material.wrapped, &EncryptionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KeyWrapError::NotFound(id) if id == "alias/a"));
    }

    #[tokio::test]
    async fn same_material_shares_master_key() {
        let a = MemoryKeyWrapper::from_material("alias/k", b"seed");
        let b = MemoryKeyWrapper::from_material("alias/k", b"seed");
        let material = a.generate_data_key(&EncryptionContext::new()).await.unwrap();
        assert!(b.unwrap(&material.wrapped, &EncryptionContext::new()).await.is_ok());
    }
}
