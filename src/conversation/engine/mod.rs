//! Conversation store orchestration.

pub mod store;

pub use store::{ChatBackends, ChatReply, ConversationStore};
