use secrecy::Secret;
use serde::Deserialize;
use url::Url;

use crate::services::with_trailing_slash;

const DEFAULT_CARD_STATUS_TOPIC: &str = "card-status-change";
const DEFAULT_MAX_CONNECTIONS: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,

    // Bearer credentials are HS256 JWTs signed by the user service
    pub jwt_secret: Secret<String>,

    // User service (client contact lookup, verification requests)
    pub user_service_url: Url,

    // Notification service
    pub notification_url: Url,
    pub card_status_topic: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_config(&config)
    }

    fn from_config(config: &config::Config) -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: config.get("database_url")?,
            database_max_connections: config
                .get("database_max_connections")
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            jwt_secret: Secret::new(config.get("jwt_secret")?),

            user_service_url: parse_url("user_service_url", config.get("user_service_url")?)?,

            notification_url: parse_url("notification_url", config.get("notification_url")?)?,
            card_status_topic: config
                .get("card_status_topic")
                .unwrap_or_else(|_| DEFAULT_CARD_STATUS_TOPIC.to_string()),
        })
    }
}

// Service bases are joined with relative paths, so they must end in '/'
fn parse_url(key: &str, raw: String) -> Result<Url, config::ConfigError> {
    Url::parse(&raw)
        .map(with_trailing_slash)
        .map_err(|e| config::ConfigError::Message(format!("{key}: {e}")))
}
