use async_trait::async_trait;
use aws_sdk_kms::Client as KmsClient;
use aws_sdk_kms::error::SdkError;
use aws_sdk_kms::primitives::Blob;
use keystash_spec::{
    EncryptionContext, KEY_MATERIAL_LEN, KeyMaterial, KeyWrapError, KeyWrapResult, KeyWrapper,
    PlaintextKey,
};
use std::collections::HashMap;
use tracing::debug;

/// [`KeyWrapper`] backed by a KMS master key.
#[derive(Clone, Debug)]
pub struct KmsKeyWrapper {
    client: KmsClient,
    key_id: String,
}

impl KmsKeyWrapper {
    pub fn new(client: KmsClient, key_id: impl Into<String>) -> Self {
        Self {
            client,
            key_id: key_id.into(),
        }
    }

    fn context(context: &EncryptionContext) -> Option<HashMap<String, String>> {
        if context.is_empty() {
            return None;
        }
        Some(context.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[async_trait]
impl KeyWrapper for KmsKeyWrapper {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn generate_data_key(&self, context: &EncryptionContext) -> KeyWrapResult<KeyMaterial> {
        let output = self
            .client
            .generate_data_key()
            .key_id(&self.key_id)
            .number_of_bytes(KEY_MATERIAL_LEN as i32)
            .set_encryption_context(Self::context(context))
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found_exception())
                {
                    KeyWrapError::NotFound(self.key_id.clone())
                } else {
                    kms_error("kms generate data key", err)
                }
            })?;

        let plaintext = output
            .plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyWrapError::InvalidMaterial("kms returned no plaintext".into()))?;
        let wrapped = output
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyWrapError::InvalidMaterial("kms returned no ciphertext".into()))?;
        let plaintext = PlaintextKey::new(plaintext)
            .map_err(|err| KeyWrapError::InvalidMaterial(err.to_string()))?;

        debug!(key_id = %self.key_id, "generated data key");
        Ok(KeyMaterial::new(plaintext, wrapped))
    }

    async fn unwrap(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> KeyWrapResult<PlaintextKey> {
        let output = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(wrapped.to_vec()))
            .set_encryption_context(Self::context(context))
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(e) if e.is_invalid_ciphertext_exception() => KeyWrapError::InvalidContext,
                Some(e) if e.is_not_found_exception() => {
                    KeyWrapError::NotFound(self.key_id.clone())
                }
                _ => kms_error("kms decrypt", err),
            })?;

        let plaintext = output
            .plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyWrapError::InvalidMaterial("kms returned no plaintext".into()))?;
        PlaintextKey::new(plaintext).map_err(|err| KeyWrapError::InvalidMaterial(err.to_string()))
    }
}

fn kms_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> KeyWrapError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    KeyWrapError::transport(operation, err)
}
