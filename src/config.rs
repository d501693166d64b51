use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CANCELLATION_WINDOW_HOURS: i64 = 24;

/// Payment gateway (Razorpay-compatible) settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Public (publishable) key id, handed to the frontend checkout.
    #[validate(length(min = 1, message = "gateway key id is required"))]
    pub key_id: String,

    /// Secret key used for basic auth and callback signature verification.
    #[validate(length(min = 1, message = "gateway key secret is required"))]
    pub key_secret: String,

    /// Base URL of the gateway REST API.
    #[serde(default = "default_gateway_api_base")]
    pub api_base: String,

    /// Bounded timeout for gateway calls, in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// ISO currency code orders are opened in.
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Hours after creation during which a booking may still be cancelled.
    #[serde(default = "default_cancellation_window")]
    pub cancellation_window_hours: i64,

    /// Payment gateway settings
    #[validate]
    pub gateway: GatewayConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_cancellation_window() -> i64 {
    DEFAULT_CANCELLATION_WINDOW_HOURS
}

fn default_gateway_api_base() -> String {
    "https://api.razorpay.com/v1".to_string()
}

fn default_gateway_timeout() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl AppConfig {
    /// Programmatic constructor used by tests and tools.
    pub fn new(
        database_url: String,
        host: String,
        port: u16,
        environment: String,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            cancellation_window_hours: default_cancellation_window(),
            gateway,
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    let filter_directive =
        env::var("RUST_LOG").unwrap_or_else(|_| format!("{},sea_orm=warn,sqlx=warn", level));

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://adspace.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // The gateway secret has no default: it MUST come from a config file or
    // environment so an unconfigured deployment cannot verify payments.
    if config.get_string("gateway.key_secret").is_err() {
        error!("Gateway secret is not configured. Set APP__GATEWAY__KEY_SECRET.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "gateway.key_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_gateway() -> GatewayConfig {
        GatewayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: "secret".into(),
            api_base: default_gateway_api_base(),
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
            currency: DEFAULT_CURRENCY.into(),
        }
    }

    #[test]
    fn constructor_applies_defaults() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
            test_gateway(),
        );
        assert_eq!(cfg.cancellation_window_hours, 24);
        assert_eq!(cfg.db_max_connections, 10);
        assert!(cfg.is_development());
    }

    #[test]
    fn empty_gateway_key_fails_validation() {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
            test_gateway(),
        );
        cfg.gateway.key_id = String::new();
        assert!(cfg.validate().is_err());
    }
}
