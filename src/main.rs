//! Wiring & DI. Entry point: bootstrap adapters, inject into services, serve HTTP.
//! No business logic here.

use dotenv::dotenv;
use hotel_crm::adapters::events::BroadcastEvents;
use hotel_crm::adapters::http::{router, AppState};
use hotel_crm::adapters::n8n::N8nWebhookClient;
use hotel_crm::adapters::persistence::SqliteRepo;
use hotel_crm::adapters::whatsapp::WhatsAppCloudClient;
use hotel_crm::ports::{WhatsAppGateway, WorkflowWebhook};
use hotel_crm::shared::config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load()?;
    if cfg.messenger_verify_token.is_none() || cfg.instagram_verify_token.is_none() {
        warn!("Messenger/Instagram verify token not set; their webhook handshakes will fail");
    }

    let data_path = PathBuf::from(cfg.data_dir_or_default());
    let repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    info!(path = %data_path.display(), "database ready");

    // --- Outbound adapters ---
    let gateway: Arc<dyn WhatsAppGateway> =
        Arc::new(WhatsAppCloudClient::new(cfg.whatsapp_api_url_or_default()));
    let n8n_timeout = cfg.n8n_timeout_secs_or_default();
    let webhook: Arc<dyn WorkflowWebhook> =
        Arc::new(N8nWebhookClient::new(Duration::from_secs(n8n_timeout)));
    info!(
        whatsapp_api = %cfg.whatsapp_api_url_or_default(),
        n8n_timeout_secs = n8n_timeout,
        "outbound clients configured"
    );

    // --- Real-time events (SSE) ---
    let events = Arc::new(BroadcastEvents::new(cfg.event_buffer_or_default()));

    // --- Services + HTTP ---
    let state = Arc::new(AppState::wire(repo, gateway, webhook, events, &cfg));
    let app = router(state);

    let addr = cfg.bind_addr_or_default();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {}: {}", addr, e))?;
    info!(addr = %addr, base_domain = %cfg.base_domain_or_default(), "hotel-crm listening");
    axum::serve(listener, app).await?;

    Ok(())
}
