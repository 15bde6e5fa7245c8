//! Shared data model and collaborator contracts for keystash.

pub mod backend;
pub mod error;
pub mod key;
pub mod record;
pub mod types;
pub mod version;
pub mod wire;

pub use backend::SecretStore;
pub use error::{
    BoxError, Error, KeyWrapError, KeyWrapResult, Result, StoreError, StoreResult,
};
pub use key::{DATA_KEY_LEN, KEY_MATERIAL_LEN, KeyMaterial, KeyWrapper, PlaintextKey};
pub use record::{RecordId, SecretRecord, VersionedPlaintext};
pub use types::{Algorithm, Digest, EncryptionContext};
pub use version::{PAD_LEN, Version, padded_int};
pub use wire::{EncryptedObject, StoredSecret};

use std::sync::Arc;

pub type DynSecretStore = Arc<dyn SecretStore>;
pub type DynKeyWrapper = Arc<dyn KeyWrapper>;
