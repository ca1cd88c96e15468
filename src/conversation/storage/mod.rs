//! Storage backends for the persisted conversation.

pub mod kv_store;

pub use kv_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StoreFuture};
