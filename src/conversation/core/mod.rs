//! Core conversation types: configuration, errors, turns and display messages.

pub mod config;
pub mod display;
pub mod errors;
pub mod turn;

pub use config::{
    ChatConfig, ContextConfig, ContextPolicy, ConversationConfig, GenerationConfig,
    HarmBlockThreshold, HarmCategory, ModelConfig, SafetySetting, ServerConfig, StorageConfig,
};
pub use display::{DisplayMessage, GREETING_ID, Sender, project};
pub use errors::{ChatError, ChatResult};
pub use turn::{ConversationLog, Role, Turn};
