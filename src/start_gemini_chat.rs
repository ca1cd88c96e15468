//! Startup helpers for the chat server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::conversation::core::config::ChatConfig;
use crate::conversation::engine::{ChatBackends, ConversationStore};
use crate::server::{self, AppState};

/// Run the server until Ctrl+C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting gemini-chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config)) {
        tracing::error!("Server error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Build the conversation store and load its history.
///
/// # Errors
/// Returns an error if storage or the model client cannot be initialized.
pub async fn initialize(config: ChatConfig) -> anyhow::Result<Arc<AppState>> {
    tracing::info!(
        "Model: {} ({}), history at {}",
        config.model.model,
        config.model.base_url(),
        config.storage.sqlite_path.display()
    );

    if config.model.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; replies will come from the local fallback");
    }

    let backends = ChatBackends::sqlite(&config)
        .await
        .context("failed to initialize backends")?;
    let store = ConversationStore::new(config, backends).context("failed to create store")?;
    let log = store.load_history().await;
    tracing::info!("Conversation ready with {} turns", log.len());

    Ok(AppState::new(store))
}

async fn serve(config: ChatConfig) -> anyhow::Result<()> {
    let server_config = config.server.clone();
    let state = initialize(config).await?;
    let listener = server::bind(&server_config)
        .await
        .with_context(|| format!("failed to bind {}", server_config.socket_addr()))?;

    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
    })
    .await
    .context("server stopped with an error")
}
