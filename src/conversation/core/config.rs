//! Configuration for the chat service.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversation::core::errors::{ChatError, ChatResult};

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Greeting shown when the log is empty.
pub const DEFAULT_GREETING: &str = "Hello, how can I help you today?";

const DEFAULT_PERSONA: &str = "You are Gemini Assistant, a friendly and concise AI assistant. \
Answer clearly and keep replies short unless the user asks for detail.";
const DEFAULT_PERSONA_ACK: &str = "Understood. I'll keep that in mind.";

/// Top-level configuration for the chat service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Remote model settings.
    pub model: ModelConfig,
    /// Conversation behaviour.
    pub conversation: ConversationConfig,
    /// Durable storage settings.
    pub storage: StorageConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl ChatConfig {
    /// Build a configuration from defaults and `GEMINI_CHAT_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults and overrides served by `lookup`.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.model.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_CHAT_MODEL") {
            config.model.model = model;
        }
        if let Some(base_url) = lookup("GEMINI_CHAT_BASE_URL") {
            config.model.base_url = Some(base_url);
        }
        if let Some(instruction) = lookup("GEMINI_CHAT_SYSTEM_INSTRUCTION") {
            config.model.system_instruction = Some(instruction);
        }
        if let Some(policy) = lookup("GEMINI_CHAT_CONTEXT_POLICY") {
            config.conversation.context.policy = parse_policy(&policy, &lookup)?;
        }
        if let Some(max_turns) = parse_var::<usize, _>(&lookup, "GEMINI_CHAT_MAX_TURNS")? {
            config.conversation.context.max_turns = Some(max_turns);
        }
        if let Some(raw) = lookup("GEMINI_CHAT_PERSIST_FALLBACK") {
            config.conversation.persist_fallback = parse_bool("GEMINI_CHAT_PERSIST_FALLBACK", &raw)?;
        }
        if let Some(timeout) = parse_var::<u64, _>(&lookup, "GEMINI_CHAT_TIMEOUT_MS")? {
            config.conversation.response_timeout_ms = timeout;
        }
        if let Some(path) = lookup("GEMINI_CHAT_DB") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(host) = parse_var::<IpAddr, _>(&lookup, "GEMINI_CHAT_HOST")? {
            config.server.host = host;
        }
        if let Some(port) = parse_var::<u16, _>(&lookup, "GEMINI_CHAT_PORT")? {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.model.model.trim().is_empty() {
            return Err(ChatError::InvalidConfig("model.model must not be empty".to_string()));
        }

        let generation = &self.model.generation;
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ChatError::InvalidConfig(
                "model.generation.temperature must be within 0.0..=2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ChatError::InvalidConfig(
                "model.generation.top_p must be within 0.0..=1.0".to_string(),
            ));
        }
        if generation.top_k == 0 {
            return Err(ChatError::InvalidConfig(
                "model.generation.top_k must be > 0".to_string(),
            ));
        }
        if generation.max_output_tokens == 0 {
            return Err(ChatError::InvalidConfig(
                "model.generation.max_output_tokens must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.model.base_url {
            Url::parse(base_url)?;
        }

        if self.conversation.greeting.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "conversation.greeting must not be empty".to_string(),
            ));
        }
        if self.conversation.response_timeout_ms == 0 {
            return Err(ChatError::InvalidConfig(
                "conversation.response_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.conversation.context.max_turns == Some(0) {
            return Err(ChatError::InvalidConfig(
                "conversation.context.max_turns must be > 0 when set".to_string(),
            ));
        }
        if let ContextPolicy::Persona { instruction, .. } = &self.conversation.context.policy {
            if instruction.trim().is_empty() {
                return Err(ChatError::InvalidConfig(
                    "persona instruction must not be empty".to_string(),
                ));
            }
        }

        if self.storage.history_key.is_empty() {
            return Err(ChatError::InvalidConfig(
                "storage.history_key must not be empty".to_string(),
            ));
        }
        let table = &self.storage.table;
        if table.is_empty()
            || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || table.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(ChatError::InvalidConfig(format!(
                "storage.table `{table}` is not a valid identifier"
            )));
        }

        Ok(())
    }
}

/// Remote model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier, e.g. `gemini-1.5-flash`.
    pub model: String,
    /// Optional custom base URL (defaults to the public Gemini endpoint).
    pub base_url: Option<String>,
    /// API key. Without one every exchange uses the fallback responder.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Optional system instruction sent with every request.
    pub system_instruction: Option<String>,
    /// Sampling parameters.
    pub generation: GenerationConfig,
    /// Content-safety thresholds.
    pub safety: Vec<SafetySetting>,
}

impl ModelConfig {
    /// Base URL to use for requests.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            api_key: None,
            system_instruction: None,
            generation: GenerationConfig::default(),
            safety: SafetySetting::block_none(),
        }
    }
}

/// Sampling parameters for generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling probability mass.
    pub top_p: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum number of generated tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// Harm categories understood by the provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HarmCategory {
    /// Hate speech.
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    /// Dangerous content.
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    /// Sexually explicit content.
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    /// Harassment.
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
}

/// Blocking thresholds understood by the provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    /// Never block.
    BlockNone,
    /// Block only high-probability harm.
    BlockOnlyHigh,
    /// Block medium and high.
    BlockMediumAndAbove,
    /// Block low, medium and high.
    BlockLowAndAbove,
}

/// One content-safety threshold.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SafetySetting {
    /// Category this threshold applies to.
    pub category: HarmCategory,
    /// Threshold for the category.
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    /// All four categories set to `BLOCK_NONE`.
    #[must_use]
    pub fn block_none() -> Vec<Self> {
        [
            HarmCategory::HateSpeech,
            HarmCategory::DangerousContent,
            HarmCategory::SexuallyExplicit,
            HarmCategory::Harassment,
        ]
        .into_iter()
        .map(|category| Self {
            category,
            threshold: HarmBlockThreshold::BlockNone,
        })
        .collect()
    }
}

/// Which prior turns accompany a request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Send only the current message.
    CurrentOnly,
    /// Send the accumulated log.
    #[default]
    FullHistory,
    /// Prepend a synthetic persona exchange before the accumulated log.
    Persona {
        /// Instruction sent as the synthetic user turn.
        instruction: String,
        /// Synthetic model acknowledgement.
        acknowledgement: String,
    },
}

impl ContextPolicy {
    /// Persona policy with the built-in assistant persona.
    #[must_use]
    pub fn default_persona() -> Self {
        Self::Persona {
            instruction: DEFAULT_PERSONA.to_string(),
            acknowledgement: DEFAULT_PERSONA_ACK.to_string(),
        }
    }
}

/// Context window settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context policy.
    pub policy: ContextPolicy,
    /// Optional cap on prior turns sent with a request.
    pub max_turns: Option<usize>,
}

/// Conversation behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Greeting displayed for an empty log.
    pub greeting: String,
    /// Context window settings.
    pub context: ContextConfig,
    /// Record fallback replies in the persisted log.
    pub persist_fallback: bool,
    /// Upper bound for one remote call, in milliseconds.
    pub response_timeout_ms: u64,
}

impl ConversationConfig {
    /// Remote call timeout as a `Duration`.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            context: ContextConfig::default(),
            persist_fallback: false,
            response_timeout_ms: 30_000,
        }
    }
}

/// Durable storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Key-value table name.
    pub table: String,
    /// Key holding the serialized history.
    pub history_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chat_history.sqlite"),
            table: "kv_store".to_string(),
            history_key: "chatHistory".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: IpAddr,
    /// Listening port; `0` picks a free one.
    pub port: u16,
}

impl ServerConfig {
    /// Address the listener binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> ChatResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ChatError::InvalidConfig(format!("{key} has invalid value `{raw}`")))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> ChatResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ChatError::InvalidConfig(format!(
            "{key} has invalid value `{raw}`"
        ))),
    }
}

fn parse_policy<F>(raw: &str, lookup: &F) -> ChatResult<ContextPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    match raw.trim().to_ascii_lowercase().as_str() {
        "current_only" => Ok(ContextPolicy::CurrentOnly),
        "full_history" => Ok(ContextPolicy::FullHistory),
        "persona" => Ok(match lookup("GEMINI_CHAT_PERSONA") {
            Some(instruction) => ContextPolicy::Persona {
                instruction,
                acknowledgement: DEFAULT_PERSONA_ACK.to_string(),
            },
            None => ContextPolicy::default_persona(),
        }),
        other => Err(ChatError::InvalidConfig(format!(
            "unknown context policy `{other}`"
        ))),
    }
}
