//! Conversation store: lifecycle, persistence and the response flow.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::conversation::context::select_history;
use crate::conversation::core::config::ChatConfig;
use crate::conversation::core::display::{DisplayMessage, project};
use crate::conversation::core::errors::{ChatError, ChatResult};
use crate::conversation::core::turn::{ConversationLog, Turn};
use crate::conversation::storage::kv_store::{KeyValueStore, SqliteKeyValueStore};
use crate::llm::fallback::{FallbackClass, FallbackResponder};
use crate::llm::gemini::GeminiClient;
use crate::llm::{ModelClient, ModelRequest};

/// Backend dependencies for the conversation store.
pub struct ChatBackends {
    /// Durable key-value storage.
    pub storage: Arc<dyn KeyValueStore>,
    /// Remote model client.
    pub model: Arc<dyn ModelClient>,
    /// Local fallback responder.
    pub fallback: FallbackResponder,
}

impl ChatBackends {
    /// Build the default `SQLite` + Gemini backends from config.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the client cannot be built.
    pub async fn sqlite(config: &ChatConfig) -> ChatResult<Self> {
        let storage = Arc::new(SqliteKeyValueStore::new(&config.storage).await?);
        let model = Arc::new(GeminiClient::new(&config.model)?);
        Ok(Self {
            storage,
            model,
            fallback: FallbackResponder::new(),
        })
    }
}

/// Answer returned by [`ConversationStore::get_response`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChatReply {
    /// Display projection of the answer.
    pub message: DisplayMessage,
    /// Set when the answer came from the fallback responder.
    pub fallback: Option<FallbackClass>,
}

impl ChatReply {
    /// Reply text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.message.text
    }

    /// Whether the remote model failed and the fallback responder answered.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

#[derive(Debug)]
enum LoadState {
    Unloaded,
    Loaded(ConversationLog),
}

/// Single owner of the conversation log.
///
/// Mutating operations (load, unload, exchange, clear) are admitted one at a
/// time through the `exchange` lock, which an exchange holds until its write
/// has finished. The `state` lock is only taken for short in-memory sections,
/// never across the remote call or a storage write, so readers are not held
/// up by an exchange in flight.
pub struct ConversationStore {
    config: ChatConfig,
    storage: Arc<dyn KeyValueStore>,
    model: Arc<dyn ModelClient>,
    fallback: FallbackResponder,
    exchange: Mutex<()>,
    state: Mutex<LoadState>,
    loaded: AtomicBool,
}

impl ConversationStore {
    /// Create a new store in the unloaded state.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ChatConfig, backends: ChatBackends) -> ChatResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            storage: backends.storage,
            model: backends.model,
            fallback: backends.fallback,
            exchange: Mutex::new(()),
            state: Mutex::new(LoadState::Unloaded),
            loaded: AtomicBool::new(false),
        })
    }

    /// Create a new store using `SQLite` storage and the Gemini client.
    ///
    /// # Errors
    /// Returns an error if backends cannot be initialized.
    pub async fn from_config(config: ChatConfig) -> ChatResult<Self> {
        let backends = ChatBackends::sqlite(&config).await?;
        Self::new(config, backends)
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Model identifier of the remote client.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Hydrate the log from durable storage. Later calls return the loaded log
    /// without touching storage.
    ///
    /// A missing key initializes and persists an empty log. Read or parse
    /// failures leave an empty in-memory log and are only logged.
    pub async fn load_history(&self) -> ConversationLog {
        let _exchange = self.exchange.lock().await;
        if let Some(log) = self.history().await {
            return log;
        }

        let key = &self.config.storage.history_key;
        let log = match self.storage.get(key).await {
            Ok(Some(raw)) => match ConversationLog::from_json(&raw) {
                Ok(log) => {
                    info!("Loaded conversation history with {} turns", log.len());
                    log
                }
                Err(e) => {
                    warn!("Stored conversation history is unreadable, starting empty: {e}");
                    ConversationLog::new()
                }
            },
            Ok(None) => {
                info!("No stored conversation history, initializing");
                let log = ConversationLog::new();
                self.persist(&log).await;
                log
            }
            Err(e) => {
                warn!("Failed to read conversation history, starting empty: {e}");
                ConversationLog::new()
            }
        };

        *self.state.lock().await = LoadState::Loaded(log.clone());
        self.loaded.store(true, Ordering::Release);
        log
    }

    /// Forget the loaded log so the next [`Self::load_history`] re-reads storage.
    pub async fn unload(&self) {
        let _exchange = self.exchange.lock().await;
        *self.state.lock().await = LoadState::Unloaded;
        self.loaded.store(false, Ordering::Release);
        debug!("Conversation store unloaded");
    }

    /// Whether [`Self::load_history`] has completed. Never waits on a pending exchange.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Snapshot of the loaded log, or `None` while unloaded.
    pub async fn history(&self) -> Option<ConversationLog> {
        match &*self.state.lock().await {
            LoadState::Loaded(log) => Some(log.clone()),
            LoadState::Unloaded => None,
        }
    }

    /// Send `message` to the model and record the exchange.
    ///
    /// Remote failures are answered by the fallback responder and never
    /// returned as errors.
    ///
    /// # Errors
    /// Returns [`ChatError::EmptyMessage`] for blank input and
    /// [`ChatError::NotLoaded`] before the history is loaded; neither mutates state.
    pub async fn get_response(&self, message: &str) -> ChatResult<ChatReply> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _exchange = self.exchange.lock().await;

        let request = {
            let state = self.state.lock().await;
            let LoadState::Loaded(log) = &*state else {
                return Err(ChatError::NotLoaded);
            };
            debug!("Requesting reply (log has {} turns)", log.len());
            ModelRequest {
                history: select_history(&self.config.conversation.context, log),
                message: message.to_string(),
            }
        };

        let (text, fallback) = match self.call_model(request).await {
            Ok(text) => (text, None),
            Err(e) => {
                warn!("Model call failed, answering locally: {e}");
                let reply = self.fallback.respond(message);
                if !self.config.conversation.persist_fallback {
                    return Ok(ChatReply {
                        message: DisplayMessage::transient_fallback(reply.text),
                        fallback: Some(reply.class),
                    });
                }
                (reply.text.to_string(), Some(reply.class))
            }
        };

        let (display, snapshot) = {
            let mut state = self.state.lock().await;
            let LoadState::Loaded(log) = &mut *state else {
                return Err(ChatError::NotLoaded);
            };
            log.push(Turn::user(message));
            log.push(Turn::model(text));
            let index = log.len() - 1;
            (DisplayMessage::from_turn(index, &log.turns()[index]), log.clone())
        };
        self.persist(&snapshot).await;

        Ok(ChatReply {
            message: if fallback.is_some() {
                display.with_error()
            } else {
                display
            },
            fallback,
        })
    }

    /// Replace the log with an empty one and persist it before returning.
    ///
    /// # Errors
    /// Returns [`ChatError::NotLoaded`] before the history is loaded, or the
    /// storage error if the cleared state could not be written. The in-memory
    /// log is cleared either way.
    pub async fn clear_history(&self) -> ChatResult<()> {
        let _exchange = self.exchange.lock().await;

        let raw = {
            let mut state = self.state.lock().await;
            let LoadState::Loaded(log) = &mut *state else {
                return Err(ChatError::NotLoaded);
            };
            *log = ConversationLog::new();
            log.to_json()?
        };
        self.storage
            .set(&self.config.storage.history_key, raw)
            .await?;

        info!("Conversation history cleared");
        Ok(())
    }

    /// Display projection of the current log; the greeting when empty or unloaded.
    pub async fn get_display_messages(&self) -> Vec<DisplayMessage> {
        let greeting = &self.config.conversation.greeting;
        match &*self.state.lock().await {
            LoadState::Loaded(log) => project(log, greeting),
            LoadState::Unloaded => vec![DisplayMessage::greeting(greeting.as_str())],
        }
    }

    async fn call_model(&self, request: ModelRequest) -> ChatResult<String> {
        let timeout = self.config.conversation.response_timeout();
        match tokio::time::timeout(timeout, self.model.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Timeout(self.config.conversation.response_timeout_ms)),
        }
    }

    async fn persist(&self, log: &ConversationLog) {
        let raw = match log.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize conversation history: {e}");
                return;
            }
        };

        if let Err(e) = self.storage.set(&self.config.storage.history_key, raw).await {
            warn!("Failed to persist conversation history: {e}");
        }
    }
}
