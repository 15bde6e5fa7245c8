//! Symmetric encryption and record authentication.

mod cipher;
mod crypter;
pub mod mac;

pub use crypter::{Crypter, Sealed};
pub(crate) use crypter::random_bytes;
