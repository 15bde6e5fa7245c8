use async_trait::async_trait;
use keystash_spec::BoxError;
use thiserror::Error;

/// One stored version of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBody {
    pub version_id: String,
    pub etag: String,
    pub bytes: Vec<u8>,
}

/// Write precondition checked against the current version of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// `If-Match`: the current version has this etag.
    IfMatch(String),
    /// `If-None-Match: *`: the key has no current version.
    IfNoneMatch,
}

/// Entry of a version listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
}

/// Position in a version listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCursor {
    pub key_marker: String,
    pub version_id_marker: String,
}

/// Versions of one key, newest first.
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    pub versions: Vec<ObjectVersion>,
    pub next: Option<VersionCursor>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("object not found")]
    NotFound,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error(transparent)]
    Transport(BoxError),
}

/// Transport to a versioned object bucket.
///
/// A client is bound to one bucket.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Read the current version of `key`, or the given version. `None` when
    /// either does not exist.
    async fn get_object(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<Option<ObjectBody>, ObjectError>;

    /// Write a new version of `key`, returning its version id. Fails with
    /// `ObjectError::PreconditionFailed` when `precondition` does not hold.
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        precondition: Precondition,
    ) -> Result<String, ObjectError>;

    /// One page of the versions of exactly `key`.
    async fn list_object_versions(
        &self,
        key: &str,
        cursor: Option<VersionCursor>,
    ) -> Result<VersionPage, ObjectError>;

    /// One page of keys under `prefix` that have a current version.
    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, ObjectError>;

    /// Permanently remove one version of `key`. Fails with
    /// `ObjectError::NotFound` when it does not exist.
    async fn delete_object_version(&self, key: &str, version_id: &str) -> Result<(), ObjectError>;
}
