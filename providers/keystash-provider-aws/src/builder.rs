use crate::dynamo::DynamoTableClient;
use crate::kms::KmsKeyWrapper;
use crate::s3::S3ObjectClient;
use anyhow::{Result, bail};
use aws_config::BehaviorVersion;
use aws_types::SdkConfig;
use aws_types::region::Region;
use keystash_core::{Keystash, KeystashConfig};
use keystash_provider_object::ObjectStore;
use keystash_provider_table::TableStore;
use keystash_spec::DynSecretStore;
use std::sync::Arc;
use tracing::info;

/// Keystash wired to AWS: DynamoDB or S3 for storage, KMS for keys.
pub type AwsKeystash = Keystash<DynSecretStore, KmsKeyWrapper>;

/// Where records live, resolved from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Table(String),
    Bucket { bucket: String, folder: String },
}

impl StoreTarget {
    /// A bucket wins over a table when both are configured.
    pub fn from_config(config: &KeystashConfig) -> Result<Self> {
        if let Some(bucket) = config.bucket.as_deref().filter(|b| !b.is_empty()) {
            return Ok(Self::Bucket {
                bucket: bucket.to_string(),
                folder: config.folder.clone().unwrap_or_default(),
            });
        }
        match config.table.as_deref().filter(|t| !t.is_empty()) {
            Some(table) => Ok(Self::Table(table.to_string())),
            None => bail!("expected a table or bucket to store secrets in"),
        }
    }
}

/// Shared SDK configuration honouring the region and endpoint overrides.
pub async fn load_sdk_config(config: &KeystashConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = config.region.clone() {
        loader = loader.region(Region::new(region));
    }
    if let Some(endpoint) = config.endpoint.as_deref() {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

/// Build the clients from an already loaded SDK configuration.
pub fn build_with_sdk_config(config: &KeystashConfig, sdk: &SdkConfig) -> Result<AwsKeystash> {
    let target = StoreTarget::from_config(config)?;
    let store: DynSecretStore = match &target {
        StoreTarget::Table(table) => {
            let client = aws_sdk_dynamodb::Client::new(sdk);
            Arc::new(TableStore::new(DynamoTableClient::new(client, table)))
        }
        StoreTarget::Bucket { bucket, folder } => {
            // emulators serve buckets by path rather than by host
            let s3_config = aws_sdk_s3::config::Builder::from(sdk)
                .force_path_style(config.endpoint.is_some())
                .build();
            let client = aws_sdk_s3::Client::from_conf(s3_config);
            Arc::new(ObjectStore::new(S3ObjectClient::new(client, bucket)).with_folder(folder))
        }
    };
    let wrapper = KmsKeyWrapper::new(aws_sdk_kms::Client::new(sdk), &config.key_id);

    info!(?target, key_id = %config.key_id, algorithm = %config.algorithm, "built aws keystash");
    Ok(Keystash::new(store, wrapper, config.crypter()))
}

/// Resolve the store target, load the SDK configuration and build.
pub async fn build_from_config(config: &KeystashConfig) -> Result<AwsKeystash> {
    StoreTarget::from_config(config)?;
    let sdk = load_sdk_config(config).await;
    build_with_sdk_config(config, &sdk)
}

/// [`build_from_config`] over [`KeystashConfig::from_env`].
pub async fn build_from_env() -> Result<AwsKeystash> {
    let config = KeystashConfig::from_env()?;
    build_from_config(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_core::{KeyWrapper, SecretStore};

    fn sdk_config() -> SdkConfig {
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build()
    }

    #[test]
    fn bucket_takes_precedence() {
        let config = KeystashConfig {
            bucket: Some("secrets".into()),
            folder: Some("prod".into()),
            ..KeystashConfig::default()
        };
        assert_eq!(
            StoreTarget::from_config(&config).unwrap(),
            StoreTarget::Bucket {
                bucket: "secrets".into(),
                folder: "prod".into()
            }
        );
        let keystash = build_with_sdk_config(&config, &sdk_config()).unwrap();
        assert_eq!(keystash.store().backend_name(), "object");
    }

    #[test]
    fn defaults_to_the_table() {
        let keystash = build_with_sdk_config(&KeystashConfig::default(), &sdk_config()).unwrap();
        assert_eq!(keystash.store().backend_name(), "table");
        assert_eq!(keystash.wrapper().key_id(), "alias/credstash");
    }

    #[tokio::test]
    async fn missing_target_fails_before_loading() {
        let config = KeystashConfig {
            table: None,
            ..KeystashConfig::default()
        };
        let err = build_from_config(&config).await.err().unwrap();
        assert!(err.to_string().contains("expected a table or bucket"));
    }
}
