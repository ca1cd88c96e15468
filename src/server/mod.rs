//! Local HTTP surface over the conversation store.
//!
//! The routes only forward to [`crate::conversation::ConversationStore`];
//! they hold no conversation state of their own.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::conversation::core::config::ServerConfig;

/// API router wrapped in permissive CORS and per-request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind the listener described by `config`.
///
/// # Errors
/// Returns an error if the address is unavailable.
pub async fn bind(config: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind(config.socket_addr()).await
}

/// Serve the chat API on `listener` until `shutdown` resolves.
///
/// # Errors
/// Returns an error if accepting connections fails.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Chat API on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
