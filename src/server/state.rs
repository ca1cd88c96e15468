//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::conversation::engine::ConversationStore;

/// Shared application state.
pub struct AppState {
    /// Owner of the conversation log.
    pub store: ConversationStore,
}

impl AppState {
    /// Wrap a conversation store for sharing with the router.
    #[must_use]
    pub fn new(store: ConversationStore) -> Arc<Self> {
        Arc::new(Self { store })
    }
}
