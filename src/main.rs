//! camnotify - camera event to push notification bridge
//!
//! Main entry point.

use camnotify::{
    broker::{self, BrokerConfig},
    config_store::{ConfigRepository, ConfigStore},
    cooldown::CooldownGate,
    device_directory::{DeviceDirectory, DeviceRepository},
    dispatch::{DisabledSender, Dispatcher, ExpoSender, FcmProxySender, PushSender},
    pipeline::Pipeline,
    review_tracker::ReviewTracker,
    state::{AppConfig, AppState},
    stats::NotificationStats,
    web_api,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camnotify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camnotify v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        review_topic = %config.review_topic,
        legacy_topic = %config.legacy_topic,
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );

    // Initialize persistence-backed stores
    let config_store = Arc::new(
        ConfigStore::new(ConfigRepository::new(config.data_dir.join("filters.json"))).await?,
    );
    tracing::info!("ConfigStore initialized");

    let devices = Arc::new(
        DeviceDirectory::new(DeviceRepository::new(config.data_dir.join("devices.json"))).await?,
    );
    tracing::info!(count = devices.count().await, "DeviceDirectory initialized");

    // Core state
    let tracker = Arc::new(ReviewTracker::new());
    let cooldown = Arc::new(CooldownGate::new());
    let stats = Arc::new(NotificationStats::new());

    // Delivery paths
    let expo: Arc<dyn PushSender> = Arc::new(ExpoSender::new(config.expo_endpoint.clone()));
    let fcm: Arc<dyn PushSender> = match config.fcm_proxy_url.clone() {
        Some(url) => {
            tracing::info!(proxy_url = %url, "FCM proxy delivery enabled");
            Arc::new(FcmProxySender::new(url, config.fcm_proxy_token.clone()))
        }
        None => {
            tracing::info!("FCM proxy not configured, FCM-style tokens will fail delivery");
            Arc::new(DisabledSender::new("FCM proxy not configured"))
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(expo, fcm));

    // Broker subscription
    let broker_config = BrokerConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        client_id: config.mqtt_client_id.clone(),
        topics: vec![config.review_topic.clone(), config.legacy_topic.clone()],
    };
    let (inbound, broker_state) = broker::start(broker_config);
    tracing::info!("Broker subscription started");

    // Pipeline
    let pipeline = Arc::new(Pipeline::new(
        config.review_topic.clone(),
        config.legacy_topic.clone(),
        config_store.clone(),
        tracker.clone(),
        cooldown.clone(),
        devices.clone(),
        dispatcher.clone(),
        stats.clone(),
    ));
    {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            pipeline.run(inbound).await;
        });
    }
    tracing::info!("Pipeline started");

    // Sweep review entries whose `end` was never delivered
    {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(600));
            loop {
                interval.tick().await;
                tracker.sweep_stale(chrono::Duration::hours(6)).await;
            }
        });
    }

    // Create application state
    let state = AppState {
        config,
        config_store,
        devices,
        tracker,
        cooldown,
        dispatcher,
        stats,
        broker_state,
        started_at: chrono::Utc::now(),
    };

    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
