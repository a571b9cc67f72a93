//! Service entry point: wires configuration, storage, external-service
//! clients, the processing pipeline, and the HTTP surface.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use spendsight::config::Config;
use spendsight::db::Database;
use spendsight::extract::{client as extract_client, HttpExpenseAnalyzer};
use spendsight::insight::{self, HttpTextGenerator, InsightGenerator};
use spendsight::notify::{self, HttpMailer, Notifier};
use spendsight::pipeline::Pipeline;
use spendsight::secrets::TicketCipher;
use spendsight::server::{self, AppState};
use spendsight::storage::ObjectStore;
use spendsight::uploads::UploadAuthorizer;

#[tokio::main]
async fn main() -> spendsight::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting spendsight v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = Database::open(&config.store.database_path)?;
    let objects = Arc::new(ObjectStore::new(
        &config.objects.root,
        &config.objects.container,
    ));

    let analyzer = Arc::new(HttpExpenseAnalyzer::new(
        &config.analyzer.endpoint,
        config.analyzer.api_key.clone(),
        extract_client::DEFAULT_TIMEOUT_SECS,
    ));

    let insight = InsightGenerator::new(
        Arc::new(HttpTextGenerator::new(
            &config.insight.endpoint,
            &config.insight.model,
            config.insight.api_key.clone(),
            insight::DEFAULT_TIMEOUT_SECS,
        )),
        config.insight.max_tokens,
        config.history_window_days,
    );

    let notifier = Notifier::new(
        Arc::new(HttpMailer::new(
            &config.mail.endpoint,
            config.mail.api_key.clone(),
            notify::DEFAULT_TIMEOUT_SECS,
        )),
        &config.mail.sender,
        &config.mail.recipient,
        &config.mail.region,
    );

    let pipeline = Arc::new(Pipeline::new(
        analyzer,
        objects.clone(),
        db,
        insight,
        notifier,
        config.history_window_days,
    ));

    let authorizer = UploadAuthorizer::new(
        TicketCipher::from_env_or_ephemeral()?,
        &config.server.public_url,
        &config.uploads.prefix,
        config.uploads.ttl_secs,
    );

    let state = Arc::new(AppState {
        authorizer,
        objects,
        pipeline,
    });
    let app = server::router(state, config.server.max_upload_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {} (public URL {})", addr, config.server.public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
