// Birth Chart Generator - Web Server

use anyhow::{Context, Result};
use birth_chart::web::{router, AppState};
use birth_chart::{open_database, Settings};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional first argument: path to a config file
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.log_filter))
                .context("Invalid log filter")?,
        )
        .init();

    info!("🌐 Birth Chart Generator - Web Server");

    let conn = open_database(&settings.database_path)?;
    info!(path = ?settings.database_path, "database opened");

    if !settings.admin_enabled() {
        warn!("admin.password_sha256 is not set; the admin panel will refuse every login");
    }

    let addr = settings.bind_address.clone();
    let app = router(AppState::new(conn, settings));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   Form:  http://{}/", addr);
    info!("   Admin: http://{}/admin", addr);

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
