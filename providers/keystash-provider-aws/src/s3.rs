use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use keystash_provider_object::{
    ObjectBody, ObjectClient, ObjectError, ObjectPage, ObjectVersion, Precondition,
    VersionCursor, VersionPage,
};

const MISSING_CODES: [&str; 2] = ["NoSuchKey", "NoSuchVersion"];
const PRECONDITION_CODES: [&str; 2] = ["PreconditionFailed", "ConditionalRequestConflict"];

/// [`ObjectClient`] over one versioned S3 bucket.
#[derive(Clone, Debug)]
pub struct S3ObjectClient {
    client: S3Client,
    bucket: String,
}

impl S3ObjectClient {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn get_object(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<Option<ObjectBody>, ObjectError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(err) if has_code(&err, &MISSING_CODES) => return Ok(None),
            Err(err) => return Err(ObjectError::Transport(Box::new(err))),
        };

        let version_id = output
            .version_id
            .ok_or_else(|| transport_message(format!("{key} has no version id")))?;
        let etag = output.e_tag.unwrap_or_default();
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| ObjectError::Transport(Box::new(err)))?
            .into_bytes()
            .to_vec();
        Ok(Some(ObjectBody {
            version_id,
            etag,
            bytes,
        }))
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        precondition: Precondition,
    ) -> Result<String, ObjectError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));
        let request = match precondition {
            Precondition::IfMatch(etag) => request.if_match(etag),
            Precondition::IfNoneMatch => request.if_none_match("*"),
        };
        match request.send().await {
            Ok(output) => output.version_id.ok_or_else(|| {
                transport_message(format!(
                    "bucket {} returned no version id; is versioning enabled?",
                    self.bucket
                ))
            }),
            Err(err) if has_code(&err, &PRECONDITION_CODES) => {
                Err(ObjectError::PreconditionFailed)
            }
            Err(err) => Err(ObjectError::Transport(Box::new(err))),
        }
    }

    async fn list_object_versions(
        &self,
        key: &str,
        cursor: Option<VersionCursor>,
    ) -> Result<VersionPage, ObjectError> {
        let (key_marker, version_id_marker) = match cursor {
            Some(cursor) => (Some(cursor.key_marker), Some(cursor.version_id_marker)),
            None => (None, None),
        };
        let output = self
            .client
            .list_object_versions()
            .bucket(&self.bucket)
            .prefix(key)
            .set_key_marker(key_marker)
            .set_version_id_marker(version_id_marker)
            .send()
            .await
            .map_err(|err| ObjectError::Transport(Box::new(err)))?;

        // the prefix also matches longer keys
        let versions = output
            .versions()
            .iter()
            .filter(|version| version.key() == Some(key))
            .filter_map(|version| {
                Some(ObjectVersion {
                    key: key.to_string(),
                    version_id: version.version_id()?.to_string(),
                })
            })
            .collect();
        let next = next_version_cursor(
            key,
            output.is_truncated().unwrap_or(false),
            output.next_key_marker(),
            output.next_version_id_marker(),
        );
        Ok(VersionPage { versions, next })
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, ObjectError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|err| ObjectError::Transport(Box::new(err)))?;
        Ok(ObjectPage {
            keys: output
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect(),
            continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn delete_object_version(&self, key: &str, version_id: &str) -> Result<(), ObjectError> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .version_id(version_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if has_code(&err, &MISSING_CODES) => Err(ObjectError::NotFound),
            Err(err) => Err(ObjectError::Transport(Box::new(err))),
        }
    }
}

fn has_code<E, R>(err: &SdkError<E, R>, codes: &[&str]) -> bool
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(context) => context
            .err()
            .code()
            .is_some_and(|code| codes.contains(&code)),
        _ => false,
    }
}

fn transport_message(message: String) -> ObjectError {
    ObjectError::Transport(message.into())
}

/// Versions are listed in key order, so once the next marker moves past
/// `key` there is nothing left for it.
fn next_version_cursor(
    key: &str,
    truncated: bool,
    next_key_marker: Option<&str>,
    next_version_id_marker: Option<&str>,
) -> Option<VersionCursor> {
    match (truncated, next_key_marker, next_version_id_marker) {
        (true, Some(key_marker), Some(version_id_marker)) if key_marker == key => {
            Some(VersionCursor {
                key_marker: key_marker.to_string(),
                version_id_marker: version_id_marker.to_string(),
            })
        }
        _ => None,
    }
}
