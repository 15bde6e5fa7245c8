use crate::record;
use anyhow::{Context, Result};
use keystash_spec::{RecordId, SecretRecord, SecretStore, StoreError, Version};
use std::collections::BTreeSet;

/// One mutation applied to every store under comparison.
#[derive(Debug, Clone)]
pub enum StoreOp {
    Create(SecretRecord),
    Delete { name: String, version: Version },
}

/// Error category of an operation, comparable across backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    AlreadyExists,
    NotFound,
}

/// Mixed script over a few names: out-of-order versions, a duplicate, an
/// exact delete and a delete of a missing pair.
pub fn standard_script(prefix: &str) -> Vec<StoreOp> {
    let db = format!("{prefix}.db");
    let api = format!("{prefix}.api");
    let token = format!("{prefix}.token");
    let duplicate = record(&db, 2);

    vec![
        StoreOp::Create(record(&db, 1)),
        StoreOp::Create(duplicate.clone()),
        StoreOp::Create(record(&db, 6)),
        StoreOp::Create(record(&api, 1)),
        StoreOp::Create(SecretRecord {
            contents: b"different".to_vec(),
            ..duplicate
        }),
        StoreOp::Create(record(&token, 3)),
        StoreOp::Create(record(&token, 4)),
        StoreOp::Delete {
            name: token.clone(),
            version: Version::padded(3),
        },
        StoreOp::Delete {
            name: api.clone(),
            version: Version::padded(9),
        },
        StoreOp::Create(record(&api, 10)),
        StoreOp::Create(record(&api, 9)),
    ]
}

/// Apply `ops` in order, recording each outcome. Errors outside the
/// comparable categories abort the replay.
pub async fn replay<S>(store: &S, ops: &[StoreOp]) -> Result<Vec<Outcome>>
where
    S: SecretStore + ?Sized,
{
    let backend = store.backend_name();
    let mut outcomes = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        let result = match op {
            StoreOp::Create(record) => store.create_secret(record.clone()).await,
            StoreOp::Delete { name, version } => store.delete_secret(name, Some(version)).await,
        };
        let outcome = match result {
            Ok(()) => Outcome::Ok,
            Err(StoreError::AlreadyExists { .. }) => Outcome::AlreadyExists,
            Err(StoreError::NotFound(_)) => Outcome::NotFound,
            Err(err) => {
                return Err(err).with_context(|| format!("{backend} op #{index} {op:?}"));
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Replay `ops` against both stores and require identical outcomes and an
/// identical resulting record set.
pub async fn assert_equivalent<A, B>(left: &A, right: &B, ops: &[StoreOp]) -> Result<()>
where
    A: SecretStore + ?Sized,
    B: SecretStore + ?Sized,
{
    let (l_name, r_name) = (left.backend_name(), right.backend_name());
    let l_outcomes = replay(left, ops).await?;
    let r_outcomes = replay(right, ops).await?;
    if l_outcomes != r_outcomes {
        anyhow::bail!("{l_name} outcomes {l_outcomes:?} differ from {r_name} {r_outcomes:?}");
    }

    let l_records = snapshot(left).await?;
    let r_records = snapshot(right).await?;
    if l_records != r_records {
        let l_ids: BTreeSet<RecordId> = l_records.iter().map(SecretRecord::id).collect();
        let r_ids: BTreeSet<RecordId> = r_records.iter().map(SecretRecord::id).collect();
        anyhow::bail!("{l_name} holds {l_ids:?}, {r_name} holds {r_ids:?}");
    }

    let names: BTreeSet<&str> = l_records.iter().map(|record| record.name.as_str()).collect();
    for name in names {
        let l_versions = left.get_all_versions(name, None).await?;
        let r_versions = right.get_all_versions(name, None).await?;
        if l_versions != r_versions {
            anyhow::bail!("get_all_versions({name}) differs between {l_name} and {r_name}");
        }
        let l_latest = left.get_latest_version(name).await?;
        let r_latest = right.get_latest_version(name).await?;
        if l_latest != r_latest {
            anyhow::bail!("get_latest_version({name}) differs between {l_name} and {r_name}");
        }
    }
    Ok(())
}

/// Every record in the store, in a backend-independent order.
pub async fn snapshot<S: SecretStore + ?Sized>(store: &S) -> Result<Vec<SecretRecord>> {
    let mut records = store
        .get_all_secrets_and_versions()
        .await
        .with_context(|| format!("{} full listing", store.backend_name()))?;
    records.sort_by(|a, b| a.id().cmp(&b.id()));
    Ok(records)
}
