use crate::version::Version;
use thiserror::Error;

/// Boxed transport error carried as the source of backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for orchestrator and crypter operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Result alias for [`crate::SecretStore`] operations.
pub type StoreResult<T> = core::result::Result<T, StoreError>;

/// Result alias for [`crate::KeyWrapper`] operations.
pub type KeyWrapResult<T> = core::result::Result<T, KeyWrapError>;

/// Canonical keystash error surface.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{name} version {version} is already in the credential store")]
    AlreadyExists { name: String, version: Version },
    #[error("computed HMAC on {name} does not match stored HMAC")]
    Integrity { name: String },
    #[error("could not generate key using key {key_id}: {source}")]
    KeyOperationFailed {
        key_id: String,
        #[source]
        source: KeyWrapError,
    },
    #[error("{message}")]
    ContextMismatch {
        message: &'static str,
        #[source]
        source: KeyWrapError,
    },
    #[error("decryption error: {source}")]
    Decryption {
        #[source]
        source: KeyWrapError,
    },
    #[error("{0}")]
    UnsupportedOperation(String),
    #[error("{0}")]
    Configuration(String),
    #[error("can not autoincrement version: the current version {0} is not an int")]
    VersionNotInteger(Version),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error(transparent)]
    KeyWrap(KeyWrapError),
    #[error(transparent)]
    Store(StoreError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn required(field: &str) -> Self {
        Self::Validation(format!("\"{field}\" is a required parameter"))
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::AlreadyExists { name, version } => Error::AlreadyExists { name, version },
            StoreError::NotFound(entity) => Error::NotFound(format!("{entity} could not be found")),
            err @ StoreError::Unsupported { .. } => Error::UnsupportedOperation(err.to_string()),
            other => Error::Store(other),
        }
    }
}

/// Failures reported by [`crate::SecretStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secret already exists with name {name}, version {version}")]
    AlreadyExists { name: String, version: Version },
    #[error("{0}")]
    NotFound(String),
    #[error("{backend} store does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
    #[error("malformed stored record: {0}")]
    Malformed(String),
    #[error("concurrent writes kept conflicting on {0}")]
    Conflict(String),
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub fn transport(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            operation,
            source: source.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Failures reported by [`crate::KeyWrapper`] implementations.
#[derive(Debug, Error)]
pub enum KeyWrapError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("wrapped key material could not be decrypted with the supplied context")]
    InvalidContext,
    #[error("invalid key material: {0}")]
    InvalidMaterial(String),
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl KeyWrapError {
    pub fn transport(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            operation,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_errors_keep_their_category() {
        let err: Error = StoreError::AlreadyExists {
            name: "db".into(),
            version: Version::padded(3),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "db version 0000000000000000003 is already in the credential store"
        );

        let err: Error = StoreError::Unsupported {
            backend: "table",
            operation: "delete without a version",
        }
        .into();
        assert!(matches!(err, Error::UnsupportedOperation(_)));

        let err: Error = StoreError::transport("scan", "connection reset").into();
        assert!(matches!(err, Error::Store(StoreError::Transport { .. })));
    }

    #[test]
    fn reclassified_errors_preserve_cause() {
        let err = Error::Decryption {
            source: KeyWrapError::transport("decrypt", "timed out"),
        };
        let source = err.source().expect("cause");
        assert_eq!(source.to_string(), "decrypt failed: timed out");
    }
}
