use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use card_issuance::api::{self, AppState};
use card_issuance::config::Config;
use card_issuance::db;
use card_issuance::services::{
    card_issuer::{CardIssuanceService, Collaborators},
    identity::JwtIdentityResolver,
    notifications::HttpNotificationGateway,
    user_client::UserServiceClient,
};
use card_issuance::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_issuance=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting card issuance service...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config).await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Wire collaborators
    let store = Arc::new(PgStore::new(pool.clone()));
    let users = Arc::new(UserServiceClient::new(config.user_service_url.clone()));
    let issuance = CardIssuanceService::new(
        Collaborators {
            cards: store.clone(),
            accounts: store,
            identity: Arc::new(JwtIdentityResolver::new(&config.jwt_secret)),
            clients: users.clone(),
            verifications: users,
            notifications: Arc::new(HttpNotificationGateway::new(
                config.notification_url.clone(),
            )),
        },
        config.card_status_topic.clone(),
    );

    let app = api::router(AppState {
        issuance: Arc::new(issuance),
        pool: Some(pool),
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
