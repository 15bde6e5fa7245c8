use crate::client::{
    AttributeValue, CONTENTS_ATTR, DIGEST_ATTR, HMAC_ATTR, Item, KEY_ATTR, NAME_ATTR, Query,
    TableClient, TableError, TableKey, VERSION_ATTR,
};
use async_trait::async_trait;
use keystash_spec::{Digest, SecretRecord, SecretStore, StoreError, StoreResult, Version};
use tracing::debug;

pub const BACKEND_NAME: &str = "table";

/// [`SecretStore`] over a key-value table keyed by `(name, version)`.
///
/// Creates are conditional writes, per-name reads are range queries and the
/// full listing is a table scan.
pub struct TableStore<C> {
    client: C,
}

impl<C: TableClient> TableStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn query_versions(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SecretRecord>> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let remaining = limit.map(|limit| limit - records.len());
            let page = self
                .client
                .query(Query {
                    name: name.to_string(),
                    descending: true,
                    limit: remaining,
                    exclusive_start_key: cursor,
                })
                .await
                .map_err(|err| transport("query", err))?;
            for item in page.items {
                records.push(item_to_record(item)?);
            }
            cursor = page.last_evaluated_key;
            let full = limit.is_some_and(|limit| records.len() >= limit);
            if cursor.is_none() || full {
                break;
            }
        }
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[async_trait]
impl<C: TableClient> SecretStore for TableStore<C> {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn create_secret(&self, record: SecretRecord) -> StoreResult<()> {
        let (name, version) = (record.name.clone(), record.version.clone());
        match self.client.put_if_absent(record_to_item(record)).await {
            Ok(()) => {
                debug!(%name, %version, "created table item");
                Ok(())
            }
            Err(TableError::ConditionFailed) => Err(StoreError::AlreadyExists { name, version }),
            Err(err) => Err(transport("put item", err)),
        }
    }

    async fn get_by_version(
        &self,
        name: &str,
        version: &Version,
    ) -> StoreResult<Option<SecretRecord>> {
        let key = TableKey::new(name, version.as_str());
        let item = self
            .client
            .get(&key)
            .await
            .map_err(|err| transport("get item", err))?;
        item.map(item_to_record).transpose()
    }

    async fn get_latest_version(&self, name: &str) -> StoreResult<Option<SecretRecord>> {
        Ok(self.query_versions(name, Some(1)).await?.into_iter().next())
    }

    async fn get_all_versions(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SecretRecord>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        self.query_versions(name, limit).await
    }

    async fn get_all_secrets_and_versions(&self) -> StoreResult<Vec<SecretRecord>> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .client
                .scan(cursor)
                .await
                .map_err(|err| transport("scan", err))?;
            for item in page.items {
                records.push(item_to_record(item)?);
            }
            cursor = page.last_evaluated_key;
            if cursor.is_none() {
                break;
            }
        }
        debug!(count = records.len(), "scanned table");
        Ok(records)
    }

    async fn delete_secret(&self, name: &str, version: Option<&Version>) -> StoreResult<()> {
        let Some(version) = version else {
            return Err(StoreError::Unsupported {
                backend: BACKEND_NAME,
                operation: "deleting without a version",
            });
        };
        match self
            .client
            .delete_if_present(&TableKey::new(name, version.as_str()))
            .await
        {
            Ok(()) => {
                debug!(%name, %version, "deleted table item");
                Ok(())
            }
            Err(TableError::ConditionFailed) => Err(StoreError::NotFound(format!(
                "{name} version {version}"
            ))),
            Err(err) => Err(transport("delete item", err)),
        }
    }
}

fn transport(operation: &'static str, err: TableError) -> StoreError {
    match err {
        TableError::Transport(source) => StoreError::Transport { operation, source },
        other => StoreError::transport(operation, other),
    }
}

pub fn record_to_item(record: SecretRecord) -> Item {
    Item::from([
        (NAME_ATTR.to_string(), AttributeValue::S(record.name)),
        (
            VERSION_ATTR.to_string(),
            AttributeValue::S(record.version.into_string()),
        ),
        (CONTENTS_ATTR.to_string(), AttributeValue::B(record.contents)),
        (KEY_ATTR.to_string(), AttributeValue::B(record.key)),
        (HMAC_ATTR.to_string(), AttributeValue::B(record.hmac)),
        (
            DIGEST_ATTR.to_string(),
            AttributeValue::S(record.digest.as_str().to_string()),
        ),
    ])
}

pub fn item_to_record(mut item: Item) -> StoreResult<SecretRecord> {
    let name = take_s(&mut item, NAME_ATTR, "")?;
    let version = take_s(&mut item, VERSION_ATTR, &name)?;
    let digest: Digest = take_s(&mut item, DIGEST_ATTR, &name)?
        .parse()
        .map_err(|err| StoreError::Malformed(format!("{name}: {err}")))?;
    Ok(SecretRecord {
        contents: take_b(&mut item, CONTENTS_ATTR, &name)?,
        // an item without a wrapped key reads as unopenable rather than malformed
        key: match item.remove(KEY_ATTR) {
            Some(AttributeValue::B(key)) => key,
            _ => Vec::new(),
        },
        hmac: take_b(&mut item, HMAC_ATTR, &name)?,
        version: Version::from(version),
        digest,
        name,
    })
}

fn take_s(item: &mut Item, attr: &str, name: &str) -> StoreResult<String> {
    match item.remove(attr) {
        Some(AttributeValue::S(value)) => Ok(value),
        _ => Err(missing(attr, name)),
    }
}

fn take_b(item: &mut Item, attr: &str, name: &str) -> StoreResult<Vec<u8>> {
    match item.remove(attr) {
        Some(AttributeValue::B(value)) => Ok(value),
        _ => Err(missing(attr, name)),
    }
}

fn missing(attr: &str, name: &str) -> StoreError {
    StoreError::Malformed(format!("item {name:?} has no {attr} attribute of the expected type"))
}
