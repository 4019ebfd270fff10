//! Store backends implementing the core's `RecordStore` capability set.

pub mod dynamodb;
pub mod memory;

pub use dynamodb::{DynamoApi, DynamoRecordStore};
pub use memory::MemoryRecordStore;
