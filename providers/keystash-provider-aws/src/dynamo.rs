use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as SdkValue;
use keystash_provider_table::client::{NAME_ATTR, VERSION_ATTR};
use keystash_provider_table::{AttributeValue, Item, Page, Query, TableClient, TableError, TableKey};
use std::collections::HashMap;

type SdkItem = HashMap<String, SdkValue>;

const NAME_PLACEHOLDER: &str = "#n";
const NAME_VALUE: &str = ":name";

/// [`TableClient`] over one DynamoDB table with `name` as hash key and
/// `version` as range key.
#[derive(Clone, Debug)]
pub struct DynamoTableClient {
    client: DynamoClient,
    table: String,
}

impl DynamoTableClient {
    pub fn new(client: DynamoClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl TableClient for DynamoTableClient {
    async fn put_if_absent(&self, item: Item) -> Result<(), TableError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_sdk_item(item)))
            .condition_expression(format!("attribute_not_exists({NAME_PLACEHOLDER})"))
            .expression_attribute_names(NAME_PLACEHOLDER, NAME_ATTR)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                Err(TableError::ConditionFailed)
            }
            Err(err) => Err(TableError::Transport(Box::new(err))),
        }
    }

    async fn get(&self, key: &TableKey) -> Result<Option<Item>, TableError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(to_sdk_key(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| TableError::Transport(Box::new(err)))?;
        Ok(output.item.map(from_sdk_item))
    }

    async fn query(&self, query: Query) -> Result<Page, TableError> {
        let limit = query
            .limit
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX));
        let output = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression(format!("{NAME_PLACEHOLDER} = {NAME_VALUE}"))
            .expression_attribute_names(NAME_PLACEHOLDER, NAME_ATTR)
            .expression_attribute_values(NAME_VALUE, SdkValue::S(query.name))
            .scan_index_forward(!query.descending)
            .consistent_read(true)
            .set_limit(limit)
            .set_exclusive_start_key(query.exclusive_start_key.as_ref().map(to_sdk_key))
            .send()
            .await
            .map_err(|err| TableError::Transport(Box::new(err)))?;
        Ok(page(output.items, output.last_evaluated_key))
    }

    async fn scan(&self, exclusive_start_key: Option<TableKey>) -> Result<Page, TableError> {
        let output = self
            .client
            .scan()
            .table_name(&self.table)
            .consistent_read(true)
            .set_exclusive_start_key(exclusive_start_key.as_ref().map(to_sdk_key))
            .send()
            .await
            .map_err(|err| TableError::Transport(Box::new(err)))?;
        Ok(page(output.items, output.last_evaluated_key))
    }

    async fn delete_if_present(&self, key: &TableKey) -> Result<(), TableError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .set_key(Some(to_sdk_key(key)))
            .condition_expression(format!("attribute_exists({NAME_PLACEHOLDER})"))
            .expression_attribute_names(NAME_PLACEHOLDER, NAME_ATTR)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                Err(TableError::ConditionFailed)
            }
            Err(err) => Err(TableError::Transport(Box::new(err))),
        }
    }
}

fn page(items: Option<Vec<SdkItem>>, last: Option<SdkItem>) -> Page {
    Page {
        items: items
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_item)
            .collect(),
        last_evaluated_key: last
            .map(from_sdk_item)
            .and_then(|key| TableKey::from_item(&key)),
    }
}

fn to_sdk_key(key: &TableKey) -> SdkItem {
    SdkItem::from([
        (NAME_ATTR.to_string(), SdkValue::S(key.name.clone())),
        (VERSION_ATTR.to_string(), SdkValue::S(key.version.clone())),
    ])
}

fn to_sdk_item(item: Item) -> SdkItem {
    item.into_iter()
        .map(|(attr, value)| {
            let value = match value {
                AttributeValue::S(value) => SdkValue::S(value),
                AttributeValue::B(value) => SdkValue::B(Blob::new(value)),
            };
            (attr, value)
        })
        .collect()
}

/// Attributes of any other type are dropped; the store reports the item as
/// malformed if it needed them.
fn from_sdk_item(item: SdkItem) -> Item {
    item.into_iter()
        .filter_map(|(attr, value)| match value {
            SdkValue::S(value) => Some((attr, AttributeValue::S(value))),
            SdkValue::B(blob) => Some((attr, AttributeValue::B(blob.into_inner()))),
            _ => None,
        })
        .collect()
}
