use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_LOT_PREFIX: &str = "MP";
const DEFAULT_SHELF_LIFE_MONTHS: u32 = 6;
const DEFAULT_KARDEX_PAGE_SIZE: u64 = 10;
const DEFAULT_KARDEX_MAX_PAGE_SIZE: u64 = 500;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Ledger behaviour knobs
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct LedgerConfig {
    /// Prefix for generated batch numbers when the product has none of its own
    #[serde(default = "default_lot_prefix")]
    #[validate(length(min = 1, max = 16))]
    pub default_lot_prefix: String,

    /// Expiration offset applied to generated lots
    #[serde(default = "default_shelf_life_months")]
    #[validate(range(min = 1, max = 120))]
    pub generated_lot_shelf_life_months: u32,

    /// Kardex page size used when the caller sends none (or a non-positive one)
    #[serde(default = "default_kardex_page_size")]
    #[validate(range(min = 1, max = 10000))]
    pub kardex_default_page_size: u64,

    /// Upper bound for a single Kardex page
    #[serde(default = "default_kardex_max_page_size")]
    #[validate(range(min = 1, max = 10000))]
    pub kardex_max_page_size: u64,

    /// Declared quantities meaning "leave the quantity alone" in bulk loads
    #[serde(default = "default_bulk_sentinels")]
    pub bulk_quantity_sentinels: Vec<i64>,

    /// How many times a purchase receipt is replayed after losing a cost update race
    #[serde(default = "default_max_conflict_retries")]
    #[validate(range(max = 20))]
    pub max_conflict_retries: u32,

    /// Capacity of the ledger event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_lot_prefix: default_lot_prefix(),
            generated_lot_shelf_life_months: default_shelf_life_months(),
            kardex_default_page_size: default_kardex_page_size(),
            kardex_max_page_size: default_kardex_max_page_size(),
            bulk_quantity_sentinels: default_bulk_sentinels(),
            max_conflict_retries: default_max_conflict_retries(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
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

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Configuration with defaults for everything but the database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            ledger: LedgerConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.ledger.kardex_default_page_size > self.ledger.kardex_max_page_size {
            let mut err = ValidationError::new("kardex_page_bounds");
            err.message =
                Some("kardex_default_page_size must not exceed kardex_max_page_size".into());
            errors.add("ledger", err);
        }

        if self.ledger.bulk_quantity_sentinels.iter().any(|s| *s >= 0) {
            let mut err = ValidationError::new("bulk_sentinels");
            err.message = Some("bulk quantity sentinels must be negative".into());
            errors.add("ledger", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("unknown_log_level")),
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
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

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_lot_prefix() -> String {
    DEFAULT_LOT_PREFIX.to_string()
}

fn default_shelf_life_months() -> u32 {
    DEFAULT_SHELF_LIFE_MONTHS
}

fn default_kardex_page_size() -> u64 {
    DEFAULT_KARDEX_PAGE_SIZE
}

fn default_kardex_max_page_size() -> u64 {
    DEFAULT_KARDEX_MAX_PAGE_SIZE
}

fn default_bulk_sentinels() -> Vec<i64> {
    vec![-1, -7]
}

fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Loads configuration from built-in defaults, optional files under `config/`, and `APP__*`
/// environment variables (highest precedence).
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

    let config = Config::builder()
        .set_default("database_url", "sqlite://planta_ledger.db?mode=rwc")?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;
    app_config.ledger.validate().map_err(|e| {
        error!("Ledger configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;
    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint check failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("planta_ledger={},sea_orm=warn,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(&filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if let Err(e) = result {
        // A subscriber is already installed (tests, embedding applications).
        eprintln!("tracing subscriber not installed: {}", e);
    }
}
