mod api; // HTTP surface
mod config;
mod error;
mod handlers;
mod models;
mod services;
#[cfg(test)]
mod test_utils;

#[cfg(feature = "http-server")]
use api::server::create_router;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use config::AppConfig;
use handlers::RecipeHandler;
use services::{AssistantAnalyzer, OpenAiAssistantClient, StrapiClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the logger reads RUST_LOG
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting Recipe Vision API...");

    let config = AppConfig::from_env().context("invalid configuration")?;

    let strapi = Arc::new(StrapiClient::new(&config.strapi));
    log::info!("✅ Strapi client initialized for {}", config.strapi.url);

    let analyzer = Arc::new(AssistantAnalyzer::new(
        OpenAiAssistantClient::new(&config.assistant),
        &config.assistant,
    ));
    log::info!(
        "✅ Assistant analyzer initialized (assistant: {}, deadline: {:?})",
        config.assistant.assistant_id,
        config.assistant.timeout
    );
    if config.assistant.timeout.is_none() {
        log::warn!("⚠️ ANALYSIS_TIMEOUT_SECS=0, assistant runs are polled without a deadline");
    }

    let recipe_handler = Arc::new(RecipeHandler::new(strapi, analyzer, config.rollback));
    log::info!("✅ Recipe handler initialized (rollback policy: {:?})", config.rollback);

    #[cfg(feature = "http-server")]
    {
        let app = create_router(recipe_handler);
        let listener = tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;

        log::info!("🌐 Server is running at http://{}", config.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;
    }

    #[cfg(not(feature = "http-server"))]
    {
        let _ = recipe_handler;
        log::warn!("⚠️ Built without the http-server feature, nothing to serve");
    }

    log::info!("🛑 Shutting down...");
    Ok(())
}

#[cfg(feature = "http-server")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for shutdown signal: {}", e);
    }
}
