use crate::ReadRetry;
use anyhow::{Context, Result};
use keystash_spec::{SecretRecord, SecretStore, Version};

pub async fn assert_record_eq<S: SecretStore + ?Sized>(
    store: &S,
    expected: &SecretRecord,
) -> Result<()> {
    let backend = store.backend_name();
    let name = &expected.name;
    let version = &expected.version;
    let got = ReadRetry::default()
        .until_found(|| store.get_by_version(name, version))
        .await
    .with_context(|| format!("get failed for {backend}:{name}@{version}"))?;
    let Some(actual) = got else {
        anyhow::bail!("expected record for {backend}:{name}@{version}, got none");
    };
    if &actual != expected {
        anyhow::bail!(
            "record mismatch for {backend}:{name}@{version} (contents {} vs {} bytes)",
            actual.contents.len(),
            expected.contents.len()
        );
    }
    Ok(())
}

pub async fn assert_deleted<S: SecretStore + ?Sized>(
    store: &S,
    name: &str,
    version: &Version,
) -> Result<()> {
    let backend = store.backend_name();
    let got = store
        .get_by_version(name, version)
        .await
        .with_context(|| format!("delete confirmation failed for {backend}:{name}@{version}"))?;
    if got.is_some() {
        anyhow::bail!("expected deletion of {backend}:{name}@{version}");
    }
    Ok(())
}

/// Check `get_all_versions` returns exactly `expected`, highest first.
pub async fn assert_versions<S: SecretStore + ?Sized>(
    store: &S,
    name: &str,
    limit: Option<usize>,
    expected: &[u64],
) -> Result<()> {
    let backend = store.backend_name();
    let records = store
        .get_all_versions(name, limit)
        .await
        .with_context(|| format!("get_all_versions failed for {backend}:{name}"))?;
    let actual: Vec<Version> = records.into_iter().map(|record| record.version).collect();
    let expected: Vec<Version> = expected.iter().copied().map(Version::padded).collect();
    if actual != expected {
        anyhow::bail!(
            "{backend}:{name} versions {actual:?}, expected {expected:?} (limit {limit:?})"
        );
    }
    Ok(())
}
