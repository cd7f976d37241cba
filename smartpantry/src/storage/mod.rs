//! Storage module
//!
//! List snapshot storage and the durable key-value store abstraction.

pub mod kv_store;
pub mod list_store;

pub use kv_store::{KeyValueStore, MemoryKeyValueStore, SetUpdate};
pub use list_store::{FileListStore, ListStore};
