//! Envelope encryption and versioned secret orchestration.
//!
//! [`Keystash`] composes a [`KeyWrapper`] minting per-secret key material, the
//! [`Crypter`] and a [`SecretStore`] backend.

pub mod config;
pub mod crypto;
pub mod keystash;
pub mod memory;
pub mod rt;

pub use config::KeystashConfig;
pub use crypto::{Crypter, Sealed};
pub use keystash::{AllSecretsOptions, GetOptions, Keystash, PutOptions};
pub use memory::MemoryKeyWrapper;

pub use keystash_spec::{
    Algorithm, Digest, DynKeyWrapper, DynSecretStore, EncryptionContext, Error, KeyWrapError,
    KeyWrapper, RecordId, Result, SecretRecord, SecretStore, StoreError, Version,
    VersionedPlaintext,
};
