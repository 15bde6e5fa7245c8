use crate::client::{Item, Page, Query, TableClient, TableError, TableKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory table with the paging behaviour of a remote one.
#[derive(Debug)]
pub struct MemoryTable {
    items: RwLock<BTreeMap<TableKey, Item>>,
    page_size: usize,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Small page sizes force callers through multiple pages.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn page<'a>(
        &self,
        mut entries: impl Iterator<Item = (&'a TableKey, &'a Item)>,
        limit: usize,
    ) -> Page {
        let mut page = Page::default();
        let mut last = None;
        for (key, item) in entries.by_ref().take(limit) {
            last = Some(key.clone());
            page.items.push(item.clone());
        }
        if entries.next().is_some() {
            page.last_evaluated_key = last;
        }
        page
    }
}

#[async_trait]
impl TableClient for MemoryTable {
    async fn put_if_absent(&self, item: Item) -> Result<(), TableError> {
        let key = TableKey::from_item(&item)
            .ok_or_else(|| TableError::Transport("item is missing its key attributes".into()))?;
        let mut items = self.items.write();
        if items.contains_key(&key) {
            return Err(TableError::ConditionFailed);
        }
        items.insert(key, item);
        Ok(())
    }

    async fn get(&self, key: &TableKey) -> Result<Option<Item>, TableError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn query(&self, query: Query) -> Result<Page, TableError> {
        let items = self.items.read();
        let limit = query.limit.unwrap_or(usize::MAX).min(self.page_size);
        let low = TableKey::new(query.name.clone(), String::new());
        let partition = items
            .range((Bound::Included(low), Bound::Unbounded))
            .take_while(|(key, _)| key.name == query.name);

        let start = query.exclusive_start_key;
        let page = if query.descending {
            let entries: Vec<_> = partition.collect();
            self.page(
                entries
                    .into_iter()
                    .rev()
                    .skip_while(|(key, _)| start.as_ref().is_some_and(|start| *key >= start)),
                limit,
            )
        } else {
            self.page(
                partition.skip_while(|(key, _)| start.as_ref().is_some_and(|start| *key <= start)),
                limit,
            )
        };
        Ok(page)
    }

    async fn scan(&self, exclusive_start_key: Option<TableKey>) -> Result<Page, TableError> {
        let items = self.items.read();
        let entries = match exclusive_start_key {
            Some(start) => items.range((Bound::Excluded(start), Bound::Unbounded)),
            None => items.range::<TableKey, _>(..),
        };
        Ok(self.page(entries, self.page_size))
    }

    async fn delete_if_present(&self, key: &TableKey) -> Result<(), TableError> {
        match self.items.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(TableError::ConditionFailed),
        }
    }
}
