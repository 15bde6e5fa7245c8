use crate::error::StoreResult;
use crate::record::SecretRecord;
use crate::version::Version;
use async_trait::async_trait;
use std::sync::Arc;

/// Persistence contract shared by every backend.
///
/// Implementations must produce the same logical record set for the same
/// sequence of operations, whatever their storage mechanics.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Short backend identifier used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Insert a record. Fails with `StoreError::AlreadyExists` when the
    /// `(name, version)` pair is already present; at most one concurrent
    /// writer of a pair succeeds.
    async fn create_secret(&self, record: SecretRecord) -> StoreResult<()>;

    async fn get_by_version(
        &self,
        name: &str,
        version: &Version,
    ) -> StoreResult<Option<SecretRecord>>;

    /// Record holding the highest version of `name`.
    async fn get_latest_version(&self, name: &str) -> StoreResult<Option<SecretRecord>>;

    /// Every version of `name`, highest version first, truncated to `limit`.
    async fn get_all_versions(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SecretRecord>>;

    /// Every version of every secret, in backend order.
    async fn get_all_secrets_and_versions(&self) -> StoreResult<Vec<SecretRecord>>;

    /// Remove exactly one record. `version: None` is only honoured by
    /// backends that can resolve a single current record; others fail with
    /// `StoreError::Unsupported`.
    async fn delete_secret(&self, name: &str, version: Option<&Version>) -> StoreResult<()>;
}

#[async_trait]
impl<T> SecretStore for Arc<T>
where
    T: SecretStore + ?Sized,
{
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn create_secret(&self, record: SecretRecord) -> StoreResult<()> {
        (**self).create_secret(record).await
    }

    async fn get_by_version(
        &self,
        name: &str,
        version: &Version,
    ) -> StoreResult<Option<SecretRecord>> {
        (**self).get_by_version(name, version).await
    }

    async fn get_latest_version(&self, name: &str) -> StoreResult<Option<SecretRecord>> {
        (**self).get_latest_version(name).await
    }

    async fn get_all_versions(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SecretRecord>> {
        (**self).get_all_versions(name, limit).await
    }

    async fn get_all_secrets_and_versions(&self) -> StoreResult<Vec<SecretRecord>> {
        (**self).get_all_secrets_and_versions().await
    }

    async fn delete_secret(&self, name: &str, version: Option<&Version>) -> StoreResult<()> {
        (**self).delete_secret(name, version).await
    }
}

#[async_trait]
impl<T> SecretStore for Box<T>
where
    T: SecretStore + ?Sized,
{
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn create_secret(&self, record: SecretRecord) -> StoreResult<()> {
        (**self).create_secret(record).await
    }

    async fn get_by_version(
        &self,
        name: &str,
        version: &Version,
    ) -> StoreResult<Option<SecretRecord>> {
        (**self).get_by_version(name, version).await
    }

    async fn get_latest_version(&self, name: &str) -> StoreResult<Option<SecretRecord>> {
        (**self).get_latest_version(name).await
    }

    async fn get_all_versions(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SecretRecord>> {
        (**self).get_all_versions(name, limit).await
    }

    async fn get_all_secrets_and_versions(&self) -> StoreResult<Vec<SecretRecord>> {
        (**self).get_all_secrets_and_versions().await
    }

    async fn delete_secret(&self, name: &str, version: Option<&Version>) -> StoreResult<()> {
        (**self).delete_secret(name, version).await
    }
}
