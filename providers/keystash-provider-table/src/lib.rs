//! Table-backed secret store.
//!
//! Records are items keyed by `name` (partition) and `version` (sort). The
//! table itself is reached through a [`TableClient`]; [`MemoryTable`] is the
//! in-process implementation.

pub mod client;
pub mod memory;
pub mod store;

pub use client::{AttributeValue, Item, Page, Query, TableClient, TableError, TableKey};
pub use memory::MemoryTable;
pub use store::TableStore;
