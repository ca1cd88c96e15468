//! Conversation subsystem.
//!
//! - `core`: configuration, errors, turns, the log and its display projection
//! - `context`: selection of prior turns sent with each request
//! - `storage`: durable key-value backends for the serialized log
//! - `engine`: the conversation store that ties storage and the model together

pub mod context;
pub mod core;
pub mod engine;
pub mod storage;

pub use context::select_history;
pub use self::core::{
    ChatConfig, ChatError, ChatResult, ContextConfig, ContextPolicy, ConversationConfig,
    ConversationLog, DisplayMessage, GenerationConfig, ModelConfig, Role, Sender, StorageConfig,
    Turn,
};
pub use engine::{ChatBackends, ChatReply, ConversationStore};
pub use storage::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
