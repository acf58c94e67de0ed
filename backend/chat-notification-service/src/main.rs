use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use chat_notification_service::config::{Config, LogFormat};
use chat_notification_service::{handlers, metrics, FirestoreClient, NotificationDispatcher};
use std::sync::Arc;
use std::time::Duration;
use taska_fcm_shared::{AccessTokenProvider, FCMClient, ServiceAccountKey};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn load_service_account(config: &Config) -> anyhow::Result<Option<ServiceAccountKey>> {
    let Some(path) = &config.google.credentials_path else {
        return Ok(None);
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading credentials file {}", path.display()))?;
    let key = serde_json::from_str(&raw)
        .with_context(|| format!("parsing credentials file {}", path.display()))?;
    Ok(Some(key))
}

/// Build the process-wide clients and the dispatcher once.
fn build_dispatcher(config: &Config) -> anyhow::Result<NotificationDispatcher> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.app.http_timeout_secs))
        .build()
        .context("building HTTP client")?;

    let service_account = load_service_account(config)?;

    let project_id = config
        .google
        .project_id
        .clone()
        .or_else(|| service_account.as_ref().map(|k| k.project_id.clone()))
        .context("GOOGLE_CLOUD_PROJECT (or FIREBASE_PROJECT_ID) must be set")?;

    let tokens = Arc::new(match service_account {
        Some(key) => {
            tracing::info!(client_email = %key.client_email, "Using service account credentials");
            AccessTokenProvider::service_account(key, http_client.clone())
        }
        None => {
            tracing::info!("Using metadata server credentials");
            AccessTokenProvider::metadata_server(http_client.clone())
        }
    });

    let store_tokens = if config.firestore.emulator_host.is_some() {
        tracing::info!(
            host = config.firestore.emulator_host.as_deref().unwrap_or_default(),
            "Using Firestore emulator"
        );
        Arc::new(AccessTokenProvider::fixed("owner"))
    } else {
        tokens.clone()
    };

    let store = FirestoreClient::new(
        &config.firestore.base_url(),
        &project_id,
        &config.firestore.database,
        store_tokens,
        http_client.clone(),
    );

    let fcm = FCMClient::new(project_id.clone(), tokens, http_client)
        .with_base_url(config.fcm.base_url.clone());

    tracing::info!(
        project_id = %project_id,
        database = %config.firestore.database,
        "Notification dispatcher initialized"
    );

    Ok(NotificationDispatcher::new(Arc::new(store), Arc::new(fcm)))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    init_tracing(config.logging.format);

    tracing::info!(env = %config.app.env, "Starting chat notification service");

    let dispatcher = Arc::new(build_dispatcher(&config)?);

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(dispatcher.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .configure(handlers::configure)
    })
    .bind(&addr)
    .with_context(|| format!("binding {}", addr))?
    .run()
    .await?;

    Ok(())
}
