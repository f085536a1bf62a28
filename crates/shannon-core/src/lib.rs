//! # shannon-core
//! Foundation types, canonical encoding, hashing and addresses for the Shannon
//! wallet engine.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod molecule;
pub mod serde_hex;
pub mod traits;
pub mod types;
