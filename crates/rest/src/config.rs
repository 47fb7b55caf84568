//! Server configuration for the DocGate REST API.
//!
//! This module provides configuration types for the REST server, supporting
//! both programmatic configuration and environment variable overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DOCGATE_PORT` | 8080 | Server port |
//! | `DOCGATE_HOST` | 127.0.0.1 | Host to bind |
//! | `DOCGATE_LOG_LEVEL` | info | Log level |
//! | `DOCGATE_MAX_BODY_SIZE` | 10485760 | Max request body (bytes) |
//! | `DOCGATE_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `DOCGATE_ENABLE_CORS` | true | Enable CORS |
//! | `DOCGATE_CORS_ORIGINS` | * | Allowed origins |
//! | `DOCGATE_CORS_METHODS` | GET,POST,PUT,PATCH,DELETE,OPTIONS | Allowed methods |
//! | `DOCGATE_CORS_HEADERS` | Content-Type,Authorization,Accept,If-Match | Allowed headers |
//! | `DOCGATE_DATABASE_URL` | docgate.db | SQLite file, or `:memory:` |
//! | `DOCGATE_DEFAULT_PAGESIZE` | 100 | Default page size |
//! | `DOCGATE_MAX_PAGESIZE` | 1000 | Maximum page size |
//! | `DOCGATE_DEFAULT_HAL_MODE` | compact | `compact` or `full` |
//! | `DOCGATE_COLL_ETAG_POLICY` | required | Etag policy for collections |
//! | `DOCGATE_DOC_ETAG_POLICY` | optional | Etag policy for documents |
//! | `DOCGATE_LOCAL_CACHE_ENABLED` | true | Cache collection properties |
//! | `DOCGATE_LOCAL_CACHE_TTL` | 60s | Lifetime of cached properties |
//! | `DOCGATE_DEBUG_ERRORS` | false | Attach error details to responses |
//!
//! # Example
//!
//! ```rust
//! use docgate_rest::ServerConfig;
//!
//! // Create from environment
//! let config = ServerConfig::from_env();
//!
//! // Or create programmatically
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     default_pagesize: 20,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// When a client must present the current etag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EtagPolicy {
    /// Every write and delete of an existing resource needs `If-Match`.
    Required,
    /// Only deletes need `If-Match`.
    RequiredForDelete,
    /// `If-Match` is checked when supplied, never demanded.
    Optional,
}

impl EtagPolicy {
    /// Returns true if a write (PUT/PATCH) must carry an etag.
    pub fn required_for_write(&self) -> bool {
        matches!(self, EtagPolicy::Required)
    }

    /// Returns true if a delete must carry an etag.
    pub fn required_for_delete(&self) -> bool {
        matches!(self, EtagPolicy::Required | EtagPolicy::RequiredForDelete)
    }
}

impl FromStr for EtagPolicy {
    type Err = String;

    /// Parses the spelling used in collection metadata (`etagDocPolicy`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "REQUIRED" => Ok(EtagPolicy::Required),
            "REQUIRED_FOR_DELETE" => Ok(EtagPolicy::RequiredForDelete),
            "OPTIONAL" => Ok(EtagPolicy::Optional),
            other => Err(format!("unknown etag policy {}", other)),
        }
    }
}

/// HAL rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HalMode {
    /// Properties and embedded resources with only `self` links.
    #[default]
    #[value(alias = "c")]
    Compact,
    /// Adds resource types, navigation links and link templates.
    #[value(alias = "f")]
    Full,
}

impl HalMode {
    /// Parses the `hal` query parameter.
    pub fn from_param(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "f" | "full" => Some(HalMode::Full),
            "c" | "compact" => Some(HalMode::Compact),
            _ => None,
        }
    }
}

/// Server configuration for the DocGate REST API.
///
/// This struct can be constructed from environment variables using [`ServerConfig::from_env`],
/// from command line arguments using [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "docgate")]
#[command(about = "HAL REST API over JSON document collections")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "DOCGATE_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "DOCGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "DOCGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "DOCGATE_MAX_BODY_SIZE", default_value = "10485760")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "DOCGATE_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "DOCGATE_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "DOCGATE_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "DOCGATE_CORS_METHODS",
        default_value = "GET,POST,PUT,PATCH,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "DOCGATE_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,If-Match"
    )]
    pub cors_headers: String,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "DOCGATE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Tag every request with an `x-request-id` header.
    #[arg(long, env = "DOCGATE_ENABLE_REQUEST_ID", default_value = "true")]
    pub enable_request_id: bool,

    /// Page size used when the request has no `pagesize`.
    #[arg(long, env = "DOCGATE_DEFAULT_PAGESIZE", default_value = "100")]
    pub default_pagesize: u64,

    /// Largest accepted `pagesize`.
    #[arg(long, env = "DOCGATE_MAX_PAGESIZE", default_value = "1000")]
    pub max_pagesize: u64,

    /// HAL mode used when the request has no `hal` parameter.
    #[arg(long, env = "DOCGATE_DEFAULT_HAL_MODE", value_enum, default_value = "compact")]
    pub default_hal_mode: HalMode,

    /// Etag policy for collection writes and deletes.
    #[arg(long, env = "DOCGATE_COLL_ETAG_POLICY", value_enum, default_value = "required")]
    pub coll_etag_policy: EtagPolicy,

    /// Etag policy for document writes and deletes, unless the collection
    /// declares `etagDocPolicy`.
    #[arg(long, env = "DOCGATE_DOC_ETAG_POLICY", value_enum, default_value = "optional")]
    pub doc_etag_policy: EtagPolicy,

    /// Cache collection properties between requests.
    #[arg(long, env = "DOCGATE_LOCAL_CACHE_ENABLED", default_value = "true")]
    pub local_cache_enabled: bool,

    /// How long cached collection properties stay valid (e.g. `60s`, `5m`).
    #[arg(
        long,
        env = "DOCGATE_LOCAL_CACHE_TTL",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    pub local_cache_ttl: Duration,

    /// Attach error type, message and source chain to error responses.
    #[arg(long, env = "DOCGATE_DEBUG_ERRORS", default_value = "false")]
    pub debug_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 10 * 1024 * 1024, // 10MB
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,PATCH,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,If-Match".to_string(),
            database_url: None,
            enable_request_id: true,
            default_pagesize: 100,
            max_pagesize: 1000,
            default_hal_mode: HalMode::Compact,
            coll_etag_policy: EtagPolicy::Required,
            doc_etag_policy: EtagPolicy::Optional,
            local_cache_enabled: true,
            local_cache_ttl: Duration::from_secs(60),
            debug_errors: false,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        Self::try_parse_from(["docgate"]).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the SQLite location, defaulting to `docgate.db`.
    pub fn database_path(&self) -> &str {
        self.database_url.as_deref().unwrap_or("docgate.db")
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.max_pagesize == 0 {
            errors.push("Max page size cannot be 0".to_string());
        }

        if self.default_pagesize > self.max_pagesize {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0 and disables features that might interfere
    /// with tests, including the properties cache.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            log_level: "debug".to_string(),
            request_timeout: 5, // Shorter timeout for tests
            enable_cors: false,
            database_url: Some(":memory:".to_string()),
            enable_request_id: false,
            local_cache_enabled: false,
            ..Default::default()
        }
    }
}
