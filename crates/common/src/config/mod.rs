//! Configuration management for SchoolBridge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::school::{School, SchoolDirectory};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Which user/school store backs the service
    #[serde(default)]
    pub store: StoreConfig,

    /// Database configuration (postgres store backend)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Outbound portal HTTP configuration
    #[serde(default)]
    pub portal: PortalConfig,

    /// Remote session lifetime configuration
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Local session (cookie) configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Static school descriptors
    #[serde(default)]
    pub schools: Vec<School>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store backend: postgres or memory
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortalConfig {
    /// Timeout for a single portal HTTP request in seconds
    #[serde(default = "default_portal_timeout")]
    pub request_timeout_secs: u64,

    /// User agent presented to school portals
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionsConfig {
    /// Remote sessions idle longer than this are logged out and evicted
    #[serde(default = "default_session_idle")]
    pub idle_timeout_secs: u64,

    /// How often the idle sweeper runs (0 disables it)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Name of the cookie carrying the local session token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Secret for signing local session tokens; random per process if unset
    pub session_secret: Option<String>,

    /// Local session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (whole gateway)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_store_backend() -> StoreBackend { StoreBackend::Postgres }
fn default_database_url() -> String { "postgres://localhost/schoolbridge".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_portal_timeout() -> u64 { 15 }
fn default_user_agent() -> String { format!("schoolbridge/{}", crate::VERSION) }
fn default_session_idle() -> u64 { 3600 }
fn default_sweep_interval() -> u64 { 300 }
fn default_cookie_name() -> String { crate::DEFAULT_SESSION_COOKIE.to_string() }
fn default_session_ttl() -> u64 { 365 * 24 * 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "schoolbridge".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get remote session idle timeout as Duration
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_timeout_secs)
    }

    /// Build the school directory from the configured descriptors
    pub fn school_directory(&self) -> SchoolDirectory {
        SchoolDirectory::new(self.schools.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: default_store_backend() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_portal_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_session_idle(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_secret: None,
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            database: DatabaseConfig::default(),
            portal: PortalConfig::default(),
            sessions: SessionsConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            schools: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::school::PortalKind;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "sessionName");
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert!(config.schools.is_empty());
    }

    #[test]
    fn test_timeouts() {
        let config = AppConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.portal.request_timeout_secs, 15);
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_schools_from_toml() {
        let toml = r#"
            [store]
            backend = "memory"

            [[schools]]
            id = 1
            name = "Lyceum 2"
            url = "https://net.school.example/"
            type = "01"
            auth = { cid = "2", scid = "17" }

            [[schools]]
            id = 2
            name = "Demo"
            url = "http://localhost"
            type = "demo"
            permission = false
        "#;

        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        let dir = config.school_directory();
        let lyceum = dir.get(1).unwrap();
        assert_eq!(lyceum.kind, PortalKind::NetSchool);
        assert_eq!(lyceum.auth_param("scid"), Some("17"));
        assert!(lyceum.permission);
        assert!(!dir.get(2).unwrap().permission);
    }
}
