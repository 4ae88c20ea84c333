use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8000;
const CONFIG_DIR: &str = "config";
const DEFAULT_CATEGORIES_TTL_SECS: u64 = 3600;
const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:9200";
const DEFAULT_SEARCH_INDEX: &str = "storefront";
const ALIPAY_LIVE_GATEWAY: &str = "https://openapi.alipay.com/gateway.do";
const ALIPAY_SANDBOX_GATEWAY: &str = "https://openapi.alipaydev.com/gateway.do";

/// Catalog listing limits
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Page size used when the caller does not pass `page_size`
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub default_page_size: u64,

    /// Upper bound on caller-supplied `page_size`
    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1))]
    pub max_page_size: u64,

    /// Maximum number of entries returned by the hot-products view
    #[serde(default = "default_hot_skus_limit")]
    #[validate(range(min = 1))]
    pub hot_skus_limit: u64,

    /// Maximum number of search keywords returned
    #[serde(default = "default_keywords_limit")]
    #[validate(range(min = 1))]
    pub keywords_limit: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            hot_skus_limit: default_hot_skus_limit(),
            keywords_limit: default_keywords_limit(),
        }
    }
}

/// Response cache configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true_bool")]
    pub enabled: bool,

    /// Lifetime of a cached category tree response
    #[serde(default = "default_categories_ttl_secs")]
    pub categories_ttl_secs: u64,

    /// Responses larger than this are never cached
    #[serde(default = "default_cache_max_body_size")]
    pub max_body_size: usize,

    /// Upper bound on cached responses; least valuable entries are evicted first
    #[serde(default = "default_cache_max_entries")]
    #[validate(range(min = 1))]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            categories_ttl_secs: DEFAULT_CATEGORIES_TTL_SECS,
            max_body_size: default_cache_max_body_size(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Search index connection
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    #[validate(url)]
    pub url: String,

    #[serde(default = "default_search_index")]
    #[validate(length(min = 1))]
    pub index: String,

    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            index: default_search_index(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

/// Alipay merchant credentials, injected into the payment gateway at construction
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AlipayConfig {
    #[serde(default)]
    pub app_id: String,

    /// PEM file holding the merchant application private key
    #[serde(default = "default_app_private_key_path")]
    pub app_private_key_path: PathBuf,

    /// PEM file holding the Alipay platform public key
    #[serde(default = "default_alipay_public_key_path")]
    pub alipay_public_key_path: PathBuf,

    /// Sandbox mode
    #[serde(default = "default_true_bool")]
    pub debug: bool,

    /// Where the browser lands after paying
    #[serde(default)]
    pub return_url: Option<String>,

    /// Explicit gateway, overriding the sandbox/live default
    #[serde(default)]
    pub gateway_url: Option<String>,
}

impl Default for AlipayConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_private_key_path: default_app_private_key_path(),
            alipay_public_key_path: default_alipay_public_key_path(),
            debug: true,
            return_url: None,
            gateway_url: None,
        }
    }
}

impl AlipayConfig {
    /// Gateway the signed query string is appended to
    pub fn gateway(&self) -> &str {
        match &self.gateway_url {
            Some(url) => url,
            None if self.debug => ALIPAY_SANDBOX_GATEWAY,
            None => ALIPAY_LIVE_GATEWAY,
        }
    }
}

/// Application configuration structure with validation
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
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// JWT secret used to verify bearer tokens on payment endpoints
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Per-request timeout applied at the HTTP layer
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

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
    #[validate]
    pub catalog: CatalogConfig,

    #[serde(default)]
    #[validate]
    pub cache: CacheConfig,

    #[serde(default)]
    #[validate]
    pub search: SearchConfig,

    #[serde(default)]
    #[validate]
    pub alipay: AlipayConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            jwt_secret,
            jwt_expiration: default_jwt_expiration(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            request_timeout_secs: default_request_timeout_secs(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            catalog: CatalogConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            alipay: AlipayConfig::default(),
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or opt in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.catalog.default_page_size > self.catalog.max_page_size {
            let mut err = ValidationError::new("default_page_size");
            err.message = Some("catalog.default_page_size must not exceed catalog.max_page_size".into());
            errors.add("catalog", err);
        }

        if !self.is_development() && self.alipay.app_id.trim().is_empty() {
            let mut err = ValidationError::new("alipay_app_id_required");
            err.message = Some("Set APP__ALIPAY__APP_ID outside development".into());
            errors.add("alipay", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_jwt_expiration() -> u64 {
    24 * 3600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_hot_skus_limit() -> u64 {
    3
}

fn default_keywords_limit() -> u64 {
    10
}

fn default_true_bool() -> bool {
    true
}

fn default_categories_ttl_secs() -> u64 {
    DEFAULT_CATEGORIES_TTL_SECS
}

fn default_cache_max_body_size() -> usize {
    1024 * 1024
}

fn default_cache_max_entries() -> u64 {
    1_000
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_search_index() -> String {
    DEFAULT_SEARCH_INDEX.to_string()
}

fn default_search_timeout_secs() -> u64 {
    5
}

fn default_app_private_key_path() -> PathBuf {
    PathBuf::from("keys/app_private_key.pem")
}

fn default_alipay_public_key_path() -> PathBuf {
    PathBuf::from("keys/alipay_public_key.pem")
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const DISALLOWED: [&str; 3] = ["your-secret-key", "default-secret-key", "changeme"];
    let lower = secret.trim().to_ascii_lowercase();
    if DISALLOWED.iter().any(|bad| lower.contains(bad)) {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be overridden with a secure random value".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

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

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "a_storefront_test_secret_that_is_long_enough".into(),
            "127.0.0.1".into(),
            8000,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins_and_app_id() {
        let cfg = base_config();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.errors().contains_key("cors_allowed_origins"));
        assert!(errors.errors().contains_key("alipay"));
    }

    #[test]
    fn non_dev_with_origins_and_app_id_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://shop.example.com".into());
        cfg.alipay.app_id = "2016091200490210".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn default_page_size_cannot_exceed_max() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.catalog.default_page_size = 500;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn short_or_placeholder_jwt_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());

        cfg.jwt_secret = "your-secret-key-your-secret-key-your-secret-key".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn alipay_gateway_follows_debug_flag() {
        let mut alipay = AlipayConfig::default();
        assert_eq!(alipay.gateway(), ALIPAY_SANDBOX_GATEWAY);
        alipay.debug = false;
        assert_eq!(alipay.gateway(), ALIPAY_LIVE_GATEWAY);
        alipay.gateway_url = Some("http://localhost:9999/gateway.do".into());
        assert_eq!(alipay.gateway(), "http://localhost:9999/gateway.do");
    }

    #[test]
    fn load_config_reads_toml_layers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
                database_url = "sqlite::memory:"
                jwt_secret = "a_storefront_test_secret_that_is_long_enough"
                environment = "development"

                [catalog]
                hot_skus_limit = 5

                [alipay]
                app_id = "2016091200490210"
                debug = true
            "#,
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.catalog.hot_skus_limit, 5);
        assert_eq!(cfg.catalog.keywords_limit, 10);
        assert_eq!(cfg.alipay.app_id, "2016091200490210");
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn shipped_default_toml_matches_built_in_defaults() {
        let shipped = Config::builder()
            .add_source(File::from(
                Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default"),
            ))
            .build()
            .unwrap();

        let catalog: CatalogConfig = shipped.get("catalog").unwrap();
        let defaults = CatalogConfig::default();
        assert_eq!(catalog.default_page_size, defaults.default_page_size);
        assert_eq!(catalog.max_page_size, defaults.max_page_size);
        assert_eq!(catalog.hot_skus_limit, defaults.hot_skus_limit);
        assert_eq!(catalog.keywords_limit, defaults.keywords_limit);

        let cache: CacheConfig = shipped.get("cache").unwrap();
        assert_eq!(cache.max_entries, CacheConfig::default().max_entries);
    }
}
