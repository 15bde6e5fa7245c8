//! Object-store-backed secret store.
//!
//! Each secret name is one object; each version of the secret is one version
//! of that object. The bucket is reached through an [`ObjectClient`];
//! [`MemoryBucket`] is the in-process implementation.

pub mod client;
pub mod memory;
pub mod store;

pub use client::{
    ObjectBody, ObjectClient, ObjectError, ObjectPage, ObjectVersion, Precondition,
    VersionCursor, VersionPage,
};
pub use memory::MemoryBucket;
pub use store::ObjectStore;
