mod api; // HTTP routes, CORS and error mapping
mod config;
mod handlers;
mod models;
mod services;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use api::{create_router, AppState};
use config::{EnvSecrets, SecretStore, Settings};
use handlers::{GroupInviteHandler, MealAnalysisHandler};
use services::{build_http_client, ModelCatalog, ProviderClient, ProviderEndpoints, ResendClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables (before the logger so RUST_LOG in .env applies)
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting Meal Tracker API...");

    let settings = Settings::from_env();
    if settings.dev_mode {
        log::warn!("⚠️ Development mode: error chains are returned to callers");
    }

    let catalog = Arc::new(ModelCatalog::new(settings.default_model.as_deref()));
    log::info!(
        "✅ Model catalog ready ({} models, default: {})",
        catalog.models().len(),
        catalog.default_model().id
    );

    let http = build_http_client(settings.request_timeout).context("failed to build HTTP client")?;
    let secrets: Arc<dyn SecretStore> = Arc::new(EnvSecrets);

    let meal_analysis = Arc::new(MealAnalysisHandler::new(
        catalog,
        secrets.clone(),
        Arc::new(ProviderClient::new(http.clone(), ProviderEndpoints::default())),
    ));
    let group_invites = Arc::new(GroupInviteHandler::new(
        secrets,
        Arc::new(ResendClient::new(http)),
        settings.invite_app_name.clone(),
    ));
    log::info!("✅ Handlers initialized (timeout: {:?})", settings.request_timeout);

    let state = Arc::new(AppState {
        meal_analysis,
        group_invites,
        dev_mode: settings.dev_mode,
    });
    let app = create_router(state, &settings.static_dir);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    log::info!("🌐 Server running on {}", addr);
    log::info!("📱 Frontend: http://localhost:{} (serving {})", settings.port, settings.static_dir);
    log::info!("🔌 API: http://localhost:{}/api", settings.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("🛑 Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("🛑 Shutting down...");
}
