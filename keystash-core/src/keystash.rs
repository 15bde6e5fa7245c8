use crate::crypto::Crypter;
use futures::future::{join_all, try_join_all};
use keystash_spec::{
    Digest, EncryptionContext, Error, KeyWrapError, KeyWrapper, RecordId, Result, SecretRecord,
    SecretStore, Version, VersionedPlaintext,
};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, instrument, warn};

const MISSING_CONTEXT: &str = "could not unwrap the data key: the credential may require \
                               that an encryption context be provided to decrypt it";
const WRONG_CONTEXT: &str = "could not unwrap the data key: the encryption context provided \
                             may not match the one used when the credential was stored";

/// Options for [`Keystash::put_secret`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub context: EncryptionContext,
    pub digest: Digest,
    /// Defaults to the padded initial version.
    pub version: Option<Version>,
    /// Fixed IV for reproducible output. Random when omitted.
    pub iv: Option<Vec<u8>>,
}

/// Options for [`Keystash::get_secret`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Exact version to read; the highest version when omitted.
    pub version: Option<Version>,
    pub context: EncryptionContext,
}

/// Options for [`Keystash::get_all_secrets`].
#[derive(Debug, Clone, Default)]
pub struct AllSecretsOptions {
    /// Only consider records at exactly this version.
    pub version: Option<Version>,
    pub context: EncryptionContext,
    /// Only consider names with this prefix.
    pub starts_with: Option<String>,
}

/// Versioned secret storage pairing a [`SecretStore`] with envelope
/// encryption through a [`KeyWrapper`].
pub struct Keystash<S, W>
where
    S: SecretStore,
    W: KeyWrapper,
{
    store: S,
    wrapper: W,
    crypter: Crypter,
}

impl<S, W> Keystash<S, W>
where
    S: SecretStore,
    W: KeyWrapper,
{
    pub fn new(store: S, wrapper: W, crypter: Crypter) -> Self {
        Self {
            store,
            wrapper,
            crypter,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn wrapper(&self) -> &W {
        &self.wrapper
    }

    pub fn crypter(&self) -> &Crypter {
        &self.crypter
    }

    /// Encrypt `secret` under fresh key material and store it as a new
    /// version of `name`, returning the version written.
    #[instrument(skip(self, secret, options), fields(backend = self.store.backend_name()))]
    pub async fn put_secret(
        &self,
        name: &str,
        secret: &[u8],
        options: PutOptions,
    ) -> Result<Version> {
        require_name(name)?;
        if secret.is_empty() {
            return Err(Error::required("secret"));
        }
        let version = match options.version {
            Some(version) if !version.is_empty() => version.normalized(),
            _ => Version::initial(),
        };

        let material = self
            .wrapper
            .generate_data_key(&options.context)
            .await
            .map_err(|err| match err {
                err @ KeyWrapError::NotFound(_) => Error::KeyWrap(err),
                source => Error::KeyOperationFailed {
                    key_id: self.wrapper.key_id().to_string(),
                    source,
                },
            })?;
        let sealed = self
            .crypter
            .encrypt(secret, options.digest, &material, options.iv.as_deref())?;
        self.store
            .create_secret(sealed.into_record(name, version.clone()))
            .await?;

        debug!(%version, digest = %options.digest, "stored secret");
        Ok(version)
    }

    /// Store `secret` at the version after the current highest one.
    pub async fn put_next_version(
        &self,
        name: &str,
        secret: &[u8],
        options: PutOptions,
    ) -> Result<Version> {
        let version = self.increment_version(name).await?;
        self.put_secret(
            name,
            secret,
            PutOptions {
                version: Some(version),
                ..options
            },
        )
        .await
    }

    /// Highest stored version of `name`, or the padded zero version.
    pub async fn highest_version(&self, name: &str) -> Result<Version> {
        require_name(name)?;
        let latest = self.store.get_latest_version(name).await?;
        Ok(latest.map_or_else(Version::zero, |record| record.version))
    }

    /// Padded successor of the highest stored version.
    pub async fn increment_version(&self, name: &str) -> Result<Version> {
        let highest = self.highest_version(name).await?;
        highest
            .next()
            .ok_or_else(|| Error::VersionNotInteger(highest))
    }

    /// Decrypt one version of `name`, the highest when no version is given.
    #[instrument(skip(self, options), fields(backend = self.store.backend_name()))]
    pub async fn get_secret(&self, name: &str, options: GetOptions) -> Result<Vec<u8>> {
        require_name(name)?;
        let record = match &options.version {
            Some(version) if !version.is_empty() => {
                let version = version.clone().normalized();
                self.store.get_by_version(name, &version).await?
            }
            _ => self.store.get_latest_version(name).await?,
        };

        let record = record
            .filter(|record| !record.key.is_empty())
            .ok_or_else(|| match &options.version {
                Some(version) => Error::NotFound(format!(
                    "{name} version {version} could not be found"
                )),
                None => Error::NotFound(format!("{name} could not be found")),
            })?;

        debug!(version = %record.version, "decrypting secret");
        self.open(&record, &options.context).await
    }

    /// Decrypt every version of `name`, highest first.
    #[instrument(skip(self, context), fields(backend = self.store.backend_name()))]
    pub async fn get_all_versions(
        &self,
        name: &str,
        context: &EncryptionContext,
        limit: Option<usize>,
    ) -> Result<Vec<VersionedPlaintext>> {
        require_name(name)?;
        let records = self.store.get_all_versions(name, limit).await?;
        debug!(count = records.len(), "decrypting versions");

        try_join_all(records.iter().map(|record| async move {
            let secret = self.open(record, context).await?;
            Ok::<_, Error>(VersionedPlaintext {
                version: record.version.clone(),
                secret,
            })
        }))
        .await
    }

    /// Remove a single version of `name`.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn delete_secret(&self, name: &str, version: &Version) -> Result<()> {
        require_name(name)?;
        if version.is_empty() {
            return Err(Error::required("version"));
        }
        let version = version.clone().normalized();
        self.store.delete_secret(name, Some(&version)).await?;
        debug!(%version, "deleted secret version");
        Ok(())
    }

    /// Remove every version of `name`, one at a time. Not atomic: a failure
    /// leaves the versions not yet reached in place.
    #[instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn delete_secrets(&self, name: &str) -> Result<Vec<Version>> {
        require_name(name)?;
        let records = self.store.get_all_versions(name, None).await?;
        let mut deleted = Vec::with_capacity(records.len());
        for record in records {
            self.store
                .delete_secret(&record.name, Some(&record.version))
                .await?;
            debug!(version = %record.version, "deleted secret version");
            deleted.push(record.version);
        }
        Ok(deleted)
    }

    /// Identifiers of stored records, sorted by name then highest version
    /// first. Restricted to `name` when given.
    pub async fn list_secrets(&self, name: Option<&str>) -> Result<Vec<RecordId>> {
        let records = match name {
            Some(name) => {
                require_name(name)?;
                self.store.get_all_versions(name, None).await?
            }
            None => self.store.get_all_secrets_and_versions().await?,
        };
        let mut ids: Vec<RecordId> = records.iter().map(SecretRecord::id).collect();
        ids.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| b.version.cmp(&a.version)));
        Ok(ids)
    }

    /// Decrypt one version per secret name.
    ///
    /// Records that fail to decrypt are logged and left out of the result
    /// rather than failing the batch.
    #[instrument(skip(self, options), fields(backend = self.store.backend_name()))]
    pub async fn get_all_secrets(
        &self,
        options: AllSecretsOptions,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let wanted = options
            .version
            .filter(|version| !version.is_empty())
            .map(Version::normalized);
        let records = self.store.get_all_secrets_and_versions().await?;

        let mut selected: BTreeMap<String, SecretRecord> = BTreeMap::new();
        for record in records {
            if let Some(prefix) = &options.starts_with {
                if !record.name.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            if let Some(version) = &wanted {
                if &record.version != version {
                    continue;
                }
            }
            match selected.entry(record.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    if record.version > slot.get().version {
                        slot.insert(record);
                    }
                }
            }
        }

        let context = &options.context;
        let opened = join_all(selected.into_values().map(|record| async move {
            let result = self.open(&record, context).await;
            (record, result)
        }))
        .await;

        let mut secrets = BTreeMap::new();
        for (record, result) in opened {
            match result {
                Ok(secret) => {
                    secrets.insert(record.name, secret);
                }
                Err(err) => {
                    warn!(
                        name = %record.name,
                        version = %record.version,
                        error = %err,
                        "skipping secret that failed to decrypt"
                    );
                }
            }
        }
        debug!(count = secrets.len(), "decrypted secrets");
        Ok(secrets)
    }

    async fn open(&self, record: &SecretRecord, context: &EncryptionContext) -> Result<Vec<u8>> {
        let key = self
            .wrapper
            .unwrap(&record.key, context)
            .await
            .map_err(|err| match err {
                KeyWrapError::InvalidContext if context.is_empty() => Error::ContextMismatch {
                    message: MISSING_CONTEXT,
                    source: err,
                },
                KeyWrapError::InvalidContext => Error::ContextMismatch {
                    message: WRONG_CONTEXT,
                    source: err,
                },
                source => Error::Decryption { source },
            })?;
        self.crypter.decrypt(record, &key)
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::required("name"));
    }
    Ok(())
}
