//! Shared conformance harness for keystash `SecretStore` backends.
//! Intended for use in integration tests of backend crates.

mod assertions;
mod capabilities;
mod env;
mod fixtures;
mod read_retry;
mod replay;
mod suite;

pub use assertions::*;
pub use capabilities::*;
pub use env::*;
pub use fixtures::*;
pub use read_retry::*;
pub use replay::*;
pub use suite::*;
