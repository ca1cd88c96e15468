//! Remote model access and the local fallback responder.

pub mod fallback;
pub mod gemini;

use std::future::Future;
use std::pin::Pin;

use crate::conversation::core::errors::ChatResult;
use crate::conversation::core::turn::Turn;

pub use fallback::{FallbackClass, FallbackReply, FallbackResponder};
pub use gemini::GeminiClient;

/// Boxed future type for model calls.
pub type ModelFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One generation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModelRequest {
    /// Prior turns, oldest first. Starts with a user turn and alternates.
    pub history: Vec<Turn>,
    /// Current user message.
    pub message: String,
}

/// Trait abstraction over text generation providers.
pub trait ModelClient: Send + Sync {
    /// Generate a reply for `request`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response has no text.
    fn generate(&self, request: ModelRequest) -> ModelFuture<'_, ChatResult<String>>;
    /// Model identifier, for logs and API responses.
    fn model_name(&self) -> &str;
}
