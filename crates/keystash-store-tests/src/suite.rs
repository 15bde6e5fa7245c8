use crate::{
    Capabilities, TestEnv, assert_deleted, assert_record_eq, assert_versions, record,
};
use anyhow::{Context, Result};
use keystash_spec::{SecretRecord, SecretStore, StoreError, Version};
use std::collections::BTreeSet;
use tracing::info;

/// Runs the shared `SecretStore` contract against a backend.
pub struct ContractSuite<'a, S: SecretStore + ?Sized> {
    store: &'a S,
    caps: Capabilities,
    env: TestEnv,
}

impl<'a, S: SecretStore + ?Sized> ContractSuite<'a, S> {
    pub fn new(store: &'a S, caps: Capabilities) -> Self {
        Self {
            env: TestEnv::from_env(store.backend_name()),
            store,
            caps,
        }
    }

    /// Use an explicit environment instead of reading `KEYSTASH_TEST_*`.
    pub fn with_env(mut self, env: TestEnv) -> Self {
        self.env = env;
        self
    }

    pub async fn run(&self) -> Result<()> {
        info!(prefix = %self.env.prefix.to_metadata(), "running store contract");
        let mut created = Vec::new();
        let outcome = self.run_cases(&mut created).await;

        if self.env.cleanup {
            for record in &created {
                // already deleted by a case, or never written
                let _ = self
                    .store
                    .delete_secret(&record.name, Some(&record.version))
                    .await;
            }
        }
        outcome
    }

    async fn run_cases(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        self.create_and_read(created).await?;
        self.duplicate_create(created).await?;
        self.version_ordering(created).await?;
        self.missing_lookups().await?;
        self.full_listing(created).await?;
        self.delete_exact(created).await?;
        self.delete_without_version(created).await?;
        self.racing_creates(created).await?;
        Ok(())
    }

    async fn create(&self, created: &mut Vec<SecretRecord>, record: SecretRecord) -> Result<()> {
        let backend = self.store.backend_name();
        let id = record.id();
        created.push(record.clone());
        self.store
            .create_secret(record)
            .await
            .with_context(|| format!("create failed for {backend}:{}@{}", id.name, id.version))
    }

    async fn create_and_read(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        let secret = record(&self.env.prefix.name("read"), 1);
        self.create(created, secret.clone()).await?;
        assert_record_eq(self.store, &secret).await?;

        let latest = self.store.get_latest_version(&secret.name).await?;
        if latest.as_ref() != Some(&secret) {
            anyhow::bail!("latest version of {} is not the only record", secret.name);
        }
        Ok(())
    }

    async fn duplicate_create(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        let first = record(&self.env.prefix.name("duplicate"), 1);
        self.create(created, first.clone()).await?;

        let mut second = record(&first.name, 1);
        second.contents = b"other".to_vec();
        match self.store.create_secret(second).await {
            Err(StoreError::AlreadyExists { name, version }) => {
                if name != first.name || version != first.version {
                    anyhow::bail!("AlreadyExists names {name}@{version}");
                }
            }
            Ok(()) => anyhow::bail!("duplicate create of {} succeeded", first.name),
            Err(other) => return Err(other).context("duplicate create"),
        }
        // the original record is untouched
        assert_record_eq(self.store, &first).await
    }

    async fn version_ordering(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        let name = self.env.prefix.name("ordering");
        for version in [2, 1, 6] {
            self.create(created, record(&name, version)).await?;
        }

        let latest = self
            .store
            .get_latest_version(&name)
            .await?
            .context("latest version missing")?;
        if latest.version != Version::padded(6) {
            anyhow::bail!("latest version of {name} is {}", latest.version);
        }
        assert_versions(self.store, &name, None, &[6, 2, 1]).await?;
        assert_versions(self.store, &name, Some(2), &[6, 2]).await?;
        assert_versions(self.store, &name, Some(10), &[6, 2, 1]).await
    }

    async fn missing_lookups(&self) -> Result<()> {
        let name = self.env.prefix.name("missing");
        if self.store.get_latest_version(&name).await?.is_some() {
            anyhow::bail!("unknown name {name} has a latest version");
        }
        if self
            .store
            .get_by_version(&name, &Version::initial())
            .await?
            .is_some()
        {
            anyhow::bail!("unknown name {name} has version 1");
        }
        assert_versions(self.store, &name, None, &[]).await
    }

    async fn full_listing(&self, created: &[SecretRecord]) -> Result<()> {
        let listed: BTreeSet<_> = self
            .store
            .get_all_secrets_and_versions()
            .await?
            .into_iter()
            .filter(|record| record.name.starts_with(self.env.prefix.base()))
            .map(|record| record.id())
            .collect();
        let expected: BTreeSet<_> = created.iter().map(SecretRecord::id).collect();
        if listed != expected {
            anyhow::bail!("listing returned {listed:?}, expected {expected:?}");
        }
        Ok(())
    }

    async fn delete_exact(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        let name = self.env.prefix.name("delete");
        self.create(created, record(&name, 1)).await?;
        self.create(created, record(&name, 2)).await?;

        let version = Version::padded(1);
        self.store.delete_secret(&name, Some(&version)).await?;
        assert_deleted(self.store, &name, &version).await?;
        assert_versions(self.store, &name, None, &[2]).await?;

        match self.store.delete_secret(&name, Some(&version)).await {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => anyhow::bail!("second delete of {name}@{version} returned {other:?}"),
        }
    }

    async fn delete_without_version(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        let name = self.env.prefix.name("delete-latest");
        self.create(created, record(&name, 1)).await?;
        self.create(created, record(&name, 3)).await?;

        let result = self.store.delete_secret(&name, None).await;
        if self.caps.delete_latest {
            result.context("delete without version")?;
            assert_versions(self.store, &name, None, &[1]).await
        } else {
            match result {
                Err(StoreError::Unsupported { .. }) => {
                    assert_versions(self.store, &name, None, &[3, 1]).await
                }
                other => anyhow::bail!("delete without version returned {other:?}"),
            }
        }
    }

    async fn racing_creates(&self, created: &mut Vec<SecretRecord>) -> Result<()> {
        let name = self.env.prefix.name("race");
        let a = record(&name, 1);
        let b = record(&name, 1);
        created.push(a.clone());

        let (first, second) = tokio::join!(
            self.store.create_secret(a.clone()),
            self.store.create_secret(b.clone())
        );
        let winner = match (first, second) {
            (Ok(()), Err(err)) if err.is_already_exists() => a,
            (Err(err), Ok(())) if err.is_already_exists() => b,
            other => anyhow::bail!("racing creates of {name} returned {other:?}"),
        };
        assert_record_eq(self.store, &winner).await
    }
}
