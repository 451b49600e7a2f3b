use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub resiliency: ResiliencyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 100 }

/// Either a full `url`, or the discrete host/user/password/name/port parts.
/// With neither, the service falls back to the in-memory store.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_port() -> u16 { 5432 }
fn default_max_connections() -> u32 { 5 }
fn default_true() -> bool { true }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_db_port(),
            user: None,
            password: None,
            name: None,
            max_connections: default_max_connections(),
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// `None` selects the in-memory store.
    pub fn connect_options(&self) -> Result<Option<PgConnectOptions>, sqlx::Error> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.parse().map(Some);
        }
        let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) else {
            return Ok(None);
        };

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(self.port)
            .username(self.user.as_deref().unwrap_or("postgres"))
            .database(self.name.as_deref().unwrap_or("voyage"));
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            options = options.password(password);
        }
        Ok(Some(options))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Airwallex,
    Mock,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AirwallexEnvironment {
    Demo,
    #[serde(alias = "prod")]
    Production,
}

impl AirwallexEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            AirwallexEnvironment::Demo => "https://api-demo.airwallex.com",
            AirwallexEnvironment::Production => "https://api.airwallex.com",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub provider: PaymentProvider,
    pub environment: AirwallexEnvironment,
    /// Overrides the environment's base URL (sandboxes, local stubs).
    pub base_url: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
}

fn default_max_retries() -> u32 { 3 }
fn default_request_timeout() -> u64 { 10 }
fn default_webhook_tolerance() -> i64 { 300 }

impl PaymentsConfig {
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResiliencyConfig {
    pub failure_threshold: usize,
    pub reset_timeout_seconds: u64,
}

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout_seconds: 30 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `VOYAGE__PAYMENTS__API_KEY=...` sets `payments.api_key`
            .add_source(
                config::Environment::with_prefix("VOYAGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Variable names used by existing deployments
            .set_override_option("payments.client_id", env::var("AIRWALLEX_CLIENT_ID").ok())?
            .set_override_option("payments.api_key", env::var("AIRWALLEX_API_KEY").ok())?
            .set_override_option("payments.environment", env::var("AIRWALLEX_ENV").ok())?
            .set_override_option("payments.webhook_secret", env::var("AIRWALLEX_WEBHOOK_SECRET").ok())?
            .set_override_option("database.host", env::var("DB_HOST").ok())?
            .set_override_option("database.user", env::var("DB_USER").ok())?
            .set_override_option("database.password", env::var("DB_PASSWORD").ok())?
            .set_override_option("database.name", env::var("DB_NAME").ok())?
            .set_override_option("database.port", env::var("DB_PORT").ok())?
            .build()?;

        s.try_deserialize()
    }
}
