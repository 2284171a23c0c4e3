// main.rs — File Zipper entry point.
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

use file_zipper_lib::{api, config::Config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_dir = if let Ok(manifest) = std::env::var("CARGO_MANIFEST_DIR") {
        PathBuf::from(&manifest)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(&manifest))
    } else {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    };

    // Loaded before tracing so RUST_LOG can come from the file.
    let env_path = base_dir.join("app.env");
    if env_path.exists() {
        dotenvy::from_path(&env_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    info!("📂 base_dir = {}", base_dir.display());

    let cfg = Config::load(&base_dir);
    cfg.print_summary();

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let static_dir = base_dir.join("static");
    let router = api::router(AppState::new(cfg), static_dir);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("🌐 File Zipper ready → open http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("👋 Bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️  cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
