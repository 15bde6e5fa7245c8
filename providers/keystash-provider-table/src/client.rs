use async_trait::async_trait;
use keystash_spec::BoxError;
use std::collections::HashMap;
use thiserror::Error;

/// Partition key attribute.
pub const NAME_ATTR: &str = "name";
/// Sort key attribute.
pub const VERSION_ATTR: &str = "version";
pub const CONTENTS_ATTR: &str = "contents";
pub const KEY_ATTR: &str = "key";
pub const HMAC_ATTR: &str = "hmac";
pub const DIGEST_ATTR: &str = "digest";

/// Attribute value subset used by secret items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttributeValue {
    S(String),
    B(Vec<u8>),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(value) => Some(value),
            Self::B(_) => None,
        }
    }

    pub fn as_b(&self) -> Option<&[u8]> {
        match self {
            Self::B(value) => Some(value),
            Self::S(_) => None,
        }
    }
}

pub type Item = HashMap<String, AttributeValue>;

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey {
    pub name: String,
    pub version: String,
}

impl TableKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Read the key attributes out of an item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let name = item.get(NAME_ATTR)?.as_s()?;
        let version = item.get(VERSION_ATTR)?.as_s()?;
        Some(Self::new(name, version))
    }
}

/// Range query over one partition.
#[derive(Debug, Clone)]
pub struct Query {
    pub name: String,
    /// Sort key descending when true.
    pub descending: bool,
    /// Upper bound on items returned in this page.
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<TableKey>,
}

/// One page of query or scan results. `last_evaluated_key` is the cursor
/// for the next page, absent once the range is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<TableKey>,
}

#[derive(Debug, Error)]
pub enum TableError {
    /// A conditional write or delete found the item in the wrong state.
    #[error("conditional check failed")]
    ConditionFailed,
    #[error(transparent)]
    Transport(BoxError),
}

/// Transport to a key-value table with a `(name, version)` composite key.
///
/// A client is bound to one table.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Write `item` unless an item with the same key exists
    /// (`TableError::ConditionFailed`).
    async fn put_if_absent(&self, item: Item) -> Result<(), TableError>;

    /// Strongly consistent point read.
    async fn get(&self, key: &TableKey) -> Result<Option<Item>, TableError>;

    async fn query(&self, query: Query) -> Result<Page, TableError>;

    async fn scan(&self, exclusive_start_key: Option<TableKey>) -> Result<Page, TableError>;

    /// Remove the item, failing with `TableError::ConditionFailed` when it
    /// does not exist.
    async fn delete_if_present(&self, key: &TableKey) -> Result<(), TableError>;
}
