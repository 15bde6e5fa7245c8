use crate::client::{
    ObjectBody, ObjectClient, ObjectError, ObjectPage, ObjectVersion, Precondition,
    VersionCursor, VersionPage,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ops::Bound;
use uuid::Uuid;

/// Default number of entries per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory versioned bucket.
///
/// Version ids are random UUIDs and etags are the SHA-256 of the body, so
/// identical bodies share an etag just as content-addressed stores do.
#[derive(Debug)]
pub struct MemoryBucket {
    // versions per key, oldest first
    objects: RwLock<BTreeMap<String, Vec<ObjectBody>>>,
    page_size: usize,
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Number of stored versions across every key.
    pub fn version_count(&self) -> usize {
        self.objects.read().values().map(Vec::len).sum()
    }
}

fn etag(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[async_trait]
impl ObjectClient for MemoryBucket {
    async fn get_object(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<Option<ObjectBody>, ObjectError> {
        let objects = self.objects.read();
        let Some(versions) = objects.get(key) else {
            return Ok(None);
        };
        let found = match version_id {
            Some(id) => versions.iter().find(|body| body.version_id == id),
            None => versions.last(),
        };
        Ok(found.cloned())
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        precondition: Precondition,
    ) -> Result<String, ObjectError> {
        let mut objects = self.objects.write();
        let versions = objects.entry(key.to_string()).or_default();
        let holds = match (&precondition, versions.last()) {
            (Precondition::IfNoneMatch, current) => current.is_none(),
            (Precondition::IfMatch(expected), Some(current)) => &current.etag == expected,
            (Precondition::IfMatch(_), None) => false,
        };
        if !holds {
            if versions.is_empty() {
                objects.remove(key);
            }
            return Err(ObjectError::PreconditionFailed);
        }

        let version_id = Uuid::new_v4().to_string();
        versions.push(ObjectBody {
            version_id: version_id.clone(),
            etag: etag(&bytes),
            bytes,
        });
        Ok(version_id)
    }

    async fn list_object_versions(
        &self,
        key: &str,
        cursor: Option<VersionCursor>,
    ) -> Result<VersionPage, ObjectError> {
        let objects = self.objects.read();
        let Some(versions) = objects.get(key) else {
            return Ok(VersionPage::default());
        };

        let mut newest_first = versions.iter().rev();
        if let Some(cursor) = cursor.filter(|cursor| cursor.key_marker == key) {
            let found = newest_first
                .by_ref()
                .any(|body| body.version_id == cursor.version_id_marker);
            if !found {
                // marker version was deleted since the previous page
                return Ok(VersionPage::default());
            }
        }

        let mut page = VersionPage::default();
        for body in newest_first.by_ref().take(self.page_size) {
            page.versions.push(ObjectVersion {
                key: key.to_string(),
                version_id: body.version_id.clone(),
            });
        }
        if newest_first.next().is_some() {
            page.next = page.versions.last().map(|last| VersionCursor {
                key_marker: key.to_string(),
                version_id_marker: last.version_id.clone(),
            });
        }
        Ok(page)
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, ObjectError> {
        let objects = self.objects.read();
        let lower = match continuation_token {
            Some(token) => Bound::Excluded(token),
            None => Bound::Included(prefix.to_string()),
        };
        let mut keys = objects
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, versions)| !versions.is_empty())
            .map(|(key, _)| key);

        let mut page = ObjectPage::default();
        page.keys.extend(keys.by_ref().take(self.page_size).cloned());
        if keys.next().is_some() {
            page.continuation_token = page.keys.last().cloned();
        }
        Ok(page)
    }

    async fn delete_object_version(
        &self,
        key: &str,
        version_id: &str,
    ) -> Result<(), ObjectError> {
        let mut objects = self.objects.write();
        let versions = objects.get_mut(key).ok_or(ObjectError::NotFound)?;
        let index = versions
            .iter()
            .position(|body| body.version_id == version_id)
            .ok_or(ObjectError::NotFound)?;
        versions.remove(index);
        if versions.is_empty() {
            objects.remove(key);
        }
        Ok(())
    }
}
