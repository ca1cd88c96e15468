//! Gemini REST client (`models/{model}:generateContent`).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::conversation::core::config::{ModelConfig, SafetySetting};
use crate::conversation::core::errors::{ChatError, ChatResult};
use crate::llm::{ModelClient, ModelFuture, ModelRequest};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// HTTP client timeout; the conversation layer applies its own, usually tighter, bound.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: WireGenerationConfig,
    safety_settings: &'a [SafetySetting],
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Async client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: ModelConfig,
}

impl GeminiClient {
    /// Create a client from model settings.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ModelConfig) -> ChatResult<Self> {
        Url::parse(config.base_url())?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CLIENT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url(),
            self.config.model
        )
    }

    async fn send(&self, request: ModelRequest) -> ChatResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ChatError::MissingApiKey)?;

        let mut contents: Vec<Content<'_>> = request
            .history
            .iter()
            .map(|turn| Content {
                role: Some(turn.role.as_str()),
                parts: vec![Part { text: &turn.text }],
            })
            .collect();
        contents.push(Content {
            role: Some("user"),
            parts: vec![Part {
                text: &request.message,
            }],
        });

        let generation = &self.config.generation;
        let body = GenerateContentRequest {
            contents,
            system_instruction: self.config.system_instruction.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: WireGenerationConfig {
                temperature: generation.temperature,
                top_p: generation.top_p,
                top_k: generation.top_k,
                max_output_tokens: generation.max_output_tokens,
            },
            safety_settings: &self.config.safety,
        };

        debug!(
            "Sending generateContent to {} with {} prior turns",
            self.config.model,
            request.history.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::RemoteStatus {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ChatError::MalformedResponse(err.to_string()))?;
        extract_text(parsed)
    }
}

impl ModelClient for GeminiClient {
    fn generate(&self, request: ModelRequest) -> ModelFuture<'_, ChatResult<String>> {
        Box::pin(self.send(request))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn extract_text(response: GenerateContentResponse) -> ChatResult<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ChatError::MalformedResponse(match block_reason {
            Some(reason) => format!("prompt blocked: {reason}"),
            None => "no candidates".to_string(),
        }));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(ChatError::MalformedResponse(format!(
            "candidate has no text (finish reason {reason})"
        )));
    }

    Ok(text)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let message = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {message}"),
                _ => message,
            })
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;
    use crate::conversation::core::turn::Turn;

    type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn spawn_provider(status: StatusCode, reply: serde_json::Value) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_handler = Arc::clone(&seen);

        let app = Router::new().route(
            "/models/gemini-test:generateContent",
            post(move |headers: HeaderMap, Json(payload): Json<serde_json::Value>| {
                let seen = Arc::clone(&seen_in_handler);
                let reply = reply.clone();
                async move {
                    let key = headers
                        .get(API_KEY_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().unwrap().push((key, payload));
                    (status, Json(reply))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    fn config_for(base_url: &str) -> ModelConfig {
        ModelConfig {
            model: "gemini-test".to_string(),
            base_url: Some(base_url.to_string()),
            api_key: Some("test-key".to_string()),
            system_instruction: Some("Be kind.".to_string()),
            ..ModelConfig::default()
        }
    }

    fn text_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_generate_sends_history_and_settings() {
        let (base_url, seen) = spawn_provider(StatusCode::OK, text_reply("Paris.")).await;
        let client = GeminiClient::new(&config_for(&base_url)).unwrap();

        let reply = client
            .generate(ModelRequest {
                history: vec![Turn::user("hi"), Turn::model("Hello!")],
                message: "Capital of France?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(reply, "Paris.");

        let seen = seen.lock().unwrap();
        let (key, body) = &seen[0];
        assert_eq!(key.as_deref(), Some("test-key"));
        assert_eq!(
            body["contents"],
            serde_json::json!([
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "Hello!"}]},
                {"role": "user", "parts": [{"text": "Capital of France?"}]}
            ])
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][1]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
    }

    #[tokio::test]
    async fn test_error_status_surfaces_provider_message() {
        let error = serde_json::json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        });
        let (base_url, _seen) = spawn_provider(StatusCode::TOO_MANY_REQUESTS, error).await;
        let client = GeminiClient::new(&config_for(&base_url)).unwrap();

        let err = client
            .generate(ModelRequest {
                history: Vec::new(),
                message: "hello".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            ChatError::RemoteStatus { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "RESOURCE_EXHAUSTED: Quota exceeded");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_malformed() {
        let blocked = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let (base_url, _seen) = spawn_provider(StatusCode::OK, blocked).await;
        let client = GeminiClient::new(&config_for(&base_url)).unwrap();

        let err = client
            .generate(ModelRequest {
                history: Vec::new(),
                message: "hello".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(ref m) if m.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let (base_url, seen) = spawn_provider(StatusCode::OK, text_reply("unused")).await;
        let mut config = config_for(&base_url);
        config.api_key = None;
        let client = GeminiClient::new(&config).unwrap();

        let err = client
            .generate(ModelRequest {
                history: Vec::new(),
                message: "hello".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("upstream exploded"), "upstream exploded");
        assert_eq!(
            error_message(r#"{"error":{"message":"bad","status":""}}"#),
            "bad"
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let mut config = ModelConfig::default();
        config.base_url = Some("http://localhost:9000/v1beta/".to_string());
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(client.model_name(), "gemini-1.5-flash");
    }
}
