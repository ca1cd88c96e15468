//! HTTP route handlers for the chat API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::conversation::core::display::DisplayMessage;
use crate::conversation::core::errors::ChatError;
use crate::llm::fallback::FallbackClass;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/messages", get(list_messages).delete(clear_messages))
        .route("/api/chat", post(chat))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gemini-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.store.model_name(),
        "loaded": state.store.is_loaded(),
    }))
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The reply text.
    pub response: String,
    /// Fallback rule used when the model was unavailable.
    pub fallback: Option<FallbackClass>,
    /// Display projection of the reply.
    pub message: DisplayMessage,
}

fn error_response(err: &ChatError) -> (StatusCode, String) {
    let status = match err {
        ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
        ChatError::NotLoaded => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Current conversation as display messages.
async fn list_messages(State(state): State<Arc<AppState>>) -> Json<Vec<DisplayMessage>> {
    Json(state.store.get_display_messages().await)
}

/// Send one message.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let reply = state
        .store
        .get_response(&request.message)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(ChatResponse {
        response: reply.text().to_string(),
        fallback: reply.fallback,
        message: reply.message,
    }))
}

/// Clear the conversation and return the fresh projection.
async fn clear_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DisplayMessage>>, (StatusCode, String)> {
    state
        .store
        .clear_history()
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(state.store.get_display_messages().await))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::conversation::core::config::ChatConfig;
    use crate::conversation::core::errors::ChatResult;
    use crate::conversation::engine::{ChatBackends, ConversationStore};
    use crate::conversation::storage::kv_store::MemoryKeyValueStore;
    use crate::llm::fallback::FallbackResponder;
    use crate::llm::{ModelClient, ModelFuture, ModelRequest};

    /// Echoes the message back; fails every call when `fail` is set and any
    /// call that mentions the weather.
    struct EchoModel {
        fail: bool,
    }

    impl ModelClient for EchoModel {
        fn generate(&self, request: ModelRequest) -> ModelFuture<'_, ChatResult<String>> {
            let fail = self.fail || request.message.contains("weather");
            Box::pin(async move {
                if fail {
                    Err(ChatError::MalformedResponse("no candidates".to_string()))
                } else {
                    Ok(format!("echo: {}", request.message))
                }
            })
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    async fn app(fail: bool, load: bool) -> Router {
        let store = ConversationStore::new(
            ChatConfig::default(),
            ChatBackends {
                storage: Arc::new(MemoryKeyValueStore::new()),
                model: Arc::new(EchoModel { fail }),
                fallback: FallbackResponder::with_seed(3),
            },
        )
        .unwrap();
        if load {
            store.load_history().await;
        }
        create_router(AppState::new(store))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn chat_request(message: &str) -> Request<Body> {
        Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "message": message }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(
            app(false, true).await,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "echo");
        assert_eq!(json["loaded"], true);
    }

    #[tokio::test]
    async fn test_chat_then_list() {
        let app = app(false, true).await;

        let (status, json) = send(app.clone(), chat_request("ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], "echo: ping");
        assert!(json["fallback"].is_null());
        assert_eq!(json["message"]["id"], "1");

        let (status, json) = send(
            app,
            Request::get("/api/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[0]["sender"], "user");
        assert_eq!(json[1]["text"], "echo: ping");
    }

    #[tokio::test]
    async fn test_chat_fallback_is_flagged() {
        let (status, json) = send(app(true, true).await, chat_request("what's your name?")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fallback"], "identity");
        assert_eq!(json["message"]["isError"], true);
    }

    #[tokio::test]
    async fn test_listing_after_fallback_omits_transient_reply() {
        let app = app(false, true).await;
        send(app.clone(), chat_request("ping")).await;

        let (status, json) = send(app.clone(), chat_request("weather tomorrow?")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fallback"], "weather");
        assert!(json["message"]["id"].as_str().unwrap().starts_with("fallback-"));

        let (status, json) = send(
            app,
            Request::get("/api/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["0", "1"]);
        assert!(json.as_array().unwrap().iter().all(|m| m.get("isError").is_none()));
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_and_unloaded() {
        let (status, _) = send(app(false, true).await, chat_request("   ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app(false, false).await, chat_request("hello")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_clear_returns_greeting() {
        let app = app(false, true).await;
        send(app.clone(), chat_request("ping")).await;

        let (status, json) = send(
            app,
            Request::delete("/api/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(1));
        assert_eq!(json[0]["id"], "initial");
    }
}
