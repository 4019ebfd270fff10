//! Concrete collaborators for `capitol_core`: the Congress.gov HTTP client
//! and store backends.

#![forbid(unsafe_code)]

pub mod congress;
pub mod store_backends;

pub use congress::CongressClient;
pub use store_backends::{DynamoRecordStore, MemoryRecordStore};
