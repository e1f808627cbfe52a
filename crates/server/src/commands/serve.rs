//! Serve command - run the HTTP server

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::app::{build_router, build_state};
use crate::args::ServeArgs;
use crate::config::AppConfig;

pub async fn execute(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());

    let state = build_state(&config).await?;
    let app = build_router(state);

    tracing::info!(listen = %listen, "Starting server");
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    axum::serve(listener, app).await?;

    Ok(())
}
