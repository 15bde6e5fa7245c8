use crate::client::{ObjectClient, ObjectError, Precondition};
use async_trait::async_trait;
use keystash_spec::wire::{decode_record, encode_record};
use keystash_spec::{SecretRecord, SecretStore, StoreError, StoreResult, Version};
use tracing::{debug, warn};

pub const BACKEND_NAME: &str = "object";

/// Attempts at a conditional create before reporting `StoreError::Conflict`.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// [`SecretStore`] over a versioned object bucket.
///
/// Each secret name maps to one object key (`folder/name`); every record is
/// one version of that object whose body is the encoded `Secret` message.
pub struct ObjectStore<C> {
    client: C,
    folder: String,
    max_attempts: usize,
}

/// A record together with the object version holding it.
struct Located {
    version_id: String,
    record: SecretRecord,
}

impl<C: ObjectClient> ObjectStore<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            folder: String::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Keep every object under `folder/`.
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into().trim_matches('/').to_string();
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Object key holding the versions of `name`.
    pub fn object_key(&self, name: &str) -> String {
        if self.folder.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.folder)
        }
    }

    fn list_prefix(&self) -> String {
        if self.folder.is_empty() {
            String::new()
        } else {
            format!("{}/", self.folder)
        }
    }

    /// Decode every version of `key`, in listing order.
    async fn load(&self, key: &str) -> StoreResult<Vec<Located>> {
        let mut located = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .client
                .list_object_versions(key, cursor)
                .await
                .map_err(|err| transport("list object versions", err))?;
            for entry in page.versions {
                let body = self
                    .client
                    .get_object(key, Some(&entry.version_id))
                    .await
                    .map_err(|err| transport("get object", err))?;
                // removed between listing and reading
                let Some(body) = body else {
                    continue;
                };
                located.push(Located {
                    version_id: entry.version_id,
                    record: decode_record(&body.bytes)?,
                });
            }
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        Ok(located)
    }

    async fn load_sorted(&self, name: &str) -> StoreResult<Vec<Located>> {
        let mut located = self.load(&self.object_key(name)).await?;
        located.sort_by(|a, b| b.record.version.cmp(&a.record.version));
        Ok(located)
    }
}

#[async_trait]
impl<C: ObjectClient> SecretStore for ObjectStore<C> {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn create_secret(&self, record: SecretRecord) -> StoreResult<()> {
        let key = self.object_key(&record.name);
        let body = encode_record(&record);

        for attempt in 1..=self.max_attempts {
            // read the current etag before listing so any write in between
            // invalidates the precondition
            let current = self
                .client
                .get_object(&key, None)
                .await
                .map_err(|err| transport("get object", err))?;
            let existing = self.load(&key).await?;
            if existing
                .iter()
                .any(|located| located.record.version == record.version)
            {
                return Err(StoreError::AlreadyExists {
                    name: record.name,
                    version: record.version,
                });
            }

            let precondition = match current {
                Some(current) => Precondition::IfMatch(current.etag),
                None => Precondition::IfNoneMatch,
            };
            match self.client.put_object(&key, body.clone(), precondition).await {
                Ok(version_id) => {
                    debug!(
                        %key,
                        version = %record.version,
                        %version_id,
                        "created object version"
                    );
                    return Ok(());
                }
                Err(ObjectError::PreconditionFailed) => {
                    warn!(%key, attempt, "concurrent write to object, re-checking");
                }
                Err(err) => return Err(transport("put object", err)),
            }
        }
        Err(StoreError::Conflict(key))
    }

    async fn get_by_version(
        &self,
        name: &str,
        version: &Version,
    ) -> StoreResult<Option<SecretRecord>> {
        let located = self.load(&self.object_key(name)).await?;
        Ok(located
            .into_iter()
            .map(|located| located.record)
            .find(|record| &record.version == version))
    }

    async fn get_latest_version(&self, name: &str) -> StoreResult<Option<SecretRecord>> {
        let located = self.load(&self.object_key(name)).await?;
        Ok(located
            .into_iter()
            .map(|located| located.record)
            .max_by(|a, b| a.version.cmp(&b.version)))
    }

    async fn get_all_versions(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SecretRecord>> {
        let mut records: Vec<SecretRecord> = self
            .load_sorted(name)
            .await?
            .into_iter()
            .map(|located| located.record)
            .collect();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn get_all_secrets_and_versions(&self) -> StoreResult<Vec<SecretRecord>> {
        let prefix = self.list_prefix();
        let mut records = Vec::new();
        let mut token = None;
        loop {
            let page = self
                .client
                .list_objects(&prefix, token)
                .await
                .map_err(|err| transport("list objects", err))?;
            // keys in nested folders belong to other stores
            let direct = page.keys.into_iter().filter(|key| {
                key.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| !rest.contains('/'))
            });
            for key in direct {
                records.extend(self.load(&key).await?.into_iter().map(|l| l.record));
            }
            token = page.continuation_token;
            if token.is_none() {
                break;
            }
        }
        debug!(count = records.len(), %prefix, "listed object versions");
        Ok(records)
    }

    async fn delete_secret(&self, name: &str, version: Option<&Version>) -> StoreResult<()> {
        let key = self.object_key(name);
        let located = self.load_sorted(name).await?;
        let target = match version {
            Some(version) => located
                .into_iter()
                .find(|located| &located.record.version == version),
            None => located.into_iter().next(),
        };
        let Some(target) = target else {
            return Err(StoreError::NotFound(match version {
                Some(version) => format!("{name} version {version}"),
                None => name.to_string(),
            }));
        };

        match self
            .client
            .delete_object_version(&key, &target.version_id)
            .await
        {
            Ok(()) => {
                debug!(%key, version = %target.record.version, "deleted object version");
                Ok(())
            }
            Err(ObjectError::NotFound) => Err(StoreError::NotFound(format!(
                "{name} version {}",
                target.record.version
            ))),
            Err(err) => Err(transport("delete object version", err)),
        }
    }
}

fn transport(operation: &'static str, err: ObjectError) -> StoreError {
    match err {
        ObjectError::Transport(source) => StoreError::Transport { operation, source },
        other => StoreError::transport(operation, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ObjectBody, ObjectPage, VersionCursor, VersionPage};
    use crate::memory::MemoryBucket;
    use keystash_spec::Digest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(name: &str, version: u64) -> SecretRecord {
        SecretRecord {
            name: name.into(),
            version: Version::padded(version),
            contents: vec![version as u8; 4],
            key: vec![1],
            hmac: vec![2],
            digest: Digest::Sha256,
        }
    }

    #[test]
    fn keys_live_under_the_folder() {
        let store = ObjectStore::new(MemoryBucket::new());
        assert_eq!(store.object_key("db"), "db");
        let store = store.with_folder("/prod/");
        assert_eq!(store.object_key("db"), "prod/db");
        assert_eq!(store.list_prefix(), "prod/");
        assert_eq!(store.folder(), "prod");
    }

    #[tokio::test]
    async fn listing_skips_nested_folders() {
        let store = ObjectStore::new(MemoryBucket::new()).with_folder("prod");
        store.create_secret(record("db", 1)).await.unwrap();
        store
            .client()
            .put_object(
                "prod/sub/hidden",
                encode_record(&record("hidden", 1)),
                Precondition::IfNoneMatch,
            )
            .await
            .unwrap();

        let names: Vec<_> = store
            .get_all_secrets_and_versions()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["db"]);
    }

    #[tokio::test]
    async fn records_are_object_versions() {
        let store = ObjectStore::new(MemoryBucket::new()).with_folder("prod");
        for version in [2, 1, 6] {
            store.create_secret(record("db", version)).await.unwrap();
        }
        assert_eq!(store.client().version_count(), 3);

        let body = store
            .client()
            .get_object("prod/db", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_record(&body.bytes).unwrap(), record("db", 6));

        let latest = store.get_latest_version("db").await.unwrap().unwrap();
        assert_eq!(latest.version, Version::padded(6));
        assert_eq!(
            store.get_by_version("db", &Version::padded(1)).await.unwrap(),
            Some(record("db", 1))
        );
    }

    #[tokio::test]
    async fn delete_without_version_removes_highest() {
        let store = ObjectStore::new(MemoryBucket::with_page_size(1));
        for version in [3, 7, 5] {
            store.create_secret(record("db", version)).await.unwrap();
        }
        store.delete_secret("db", None).await.unwrap();
        let versions: Vec<_> = store
            .get_all_versions("db", None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, [5, 3].map(Version::padded).to_vec());

        let err = store.delete_secret("missing", None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    /// Bucket that lets another writer slip in the same record between the
    /// store's read and its conditional write.
    struct Interleaved {
        inner: MemoryBucket,
        racer: SecretRecord,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl ObjectClient for Interleaved {
        async fn get_object(
            &self,
            key: &str,
            version_id: Option<&str>,
        ) -> Result<Option<ObjectBody>, ObjectError> {
            self.inner.get_object(key, version_id).await
        }

        async fn put_object(
            &self,
            key: &str,
            bytes: Vec<u8>,
            precondition: Precondition,
        ) -> Result<String, ObjectError> {
            if self.puts.fetch_add(1, Ordering::SeqCst) == 0 {
                let current = self.inner.get_object(key, None).await?;
                let racing = match current {
                    Some(current) => Precondition::IfMatch(current.etag),
                    None => Precondition::IfNoneMatch,
                };
                self.inner
                    .put_object(key, encode_record(&self.racer), racing)
                    .await?;
            }
            self.inner.put_object(key, bytes, precondition).await
        }

        async fn list_object_versions(
            &self,
            key: &str,
            cursor: Option<VersionCursor>,
        ) -> Result<VersionPage, ObjectError> {
            self.inner.list_object_versions(key, cursor).await
        }

        async fn list_objects(
            &self,
            prefix: &str,
            continuation_token: Option<String>,
        ) -> Result<ObjectPage, ObjectError> {
            self.inner.list_objects(prefix, continuation_token).await
        }

        async fn delete_object_version(
            &self,
            key: &str,
            version_id: &str,
        ) -> Result<(), ObjectError> {
            self.inner.delete_object_version(key, version_id).await
        }
    }

    #[tokio::test]
    async fn losing_a_race_reports_already_exists() {
        let mut racer = record("db", 1);
        racer.contents = b"winner".to_vec();
        let store = ObjectStore::new(Interleaved {
            inner: MemoryBucket::new(),
            racer: racer.clone(),
            puts: AtomicUsize::new(0),
        });

        let err = store.create_secret(record("db", 1)).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.get_latest_version("db").await.unwrap(), Some(racer));
        assert_eq!(store.client().inner.version_count(), 1);
    }

    #[tokio::test]
    async fn losing_a_race_for_another_version_retries() {
        let store = ObjectStore::new(Interleaved {
            inner: MemoryBucket::new(),
            racer: record("db", 2),
            puts: AtomicUsize::new(0),
        });

        store.create_secret(record("db", 1)).await.unwrap();
        let versions: Vec<_> = store
            .get_all_versions("db", None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, [2, 1].map(Version::padded).to_vec());
    }

    #[tokio::test]
    async fn a_single_attempt_reports_the_conflict() {
        let store = ObjectStore::new(Interleaved {
            inner: MemoryBucket::new(),
            racer: record("db", 2),
            puts: AtomicUsize::new(0),
        })
        .with_max_attempts(1);

        let err = store.create_secret(record("db", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref key) if key == "db"));
        assert_eq!(store.client().inner.version_count(), 1);
    }
}
