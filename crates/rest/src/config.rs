//! Server configuration.
//!
//! This module provides the configuration of the Tabula server, supporting
//! both programmatic configuration and environment variable overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TABULA_PORT` | 8080 | Server port |
//! | `TABULA_HOST` | 127.0.0.1 | Host to bind |
//! | `TABULA_LOG_LEVEL` | info | Log level |
//! | `TABULA_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `TABULA_ENABLE_CORS` | true | Enable CORS |
//! | `TABULA_CORS_ORIGINS` | * | Allowed origins |
//! | `TABULA_CORS_METHODS` | GET,POST,PUT,PATCH,DELETE,OPTIONS | Allowed methods |
//! | `TABULA_CORS_HEADERS` | Content-Type,Authorization,Accept | Allowed headers |
//! | `TABULA_DATABASE_URL` | (in-memory) | SQLite database file |
//! | `TABULA_SCHEMA_DIR` | (none) | Directory of `schema_*.json` files |
//! | `TABULA_DASHBOARD_ROOT` | (none) | Static files served next to the API |
//! | `TABULA_DEFAULT_PAGE_SIZE` | 20 | Default page size for lists |
//! | `TABULA_MAX_PAGE_SIZE` | 500 | Maximum page size for lists |
//! | `TABULA_BOOTSTRAP_EMAIL` | admin@localhost | Account created for the bootstrap token |
//! | `TABULA_BOOTSTRAP_TOKEN` | (none) | API token of the bootstrap account |
//!
//! # Example
//!
//! ```rust
//! use tabula_rest::ServerConfig;
//!
//! // Create from environment
//! let config = ServerConfig::from_env();
//!
//! // Or create programmatically
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;

use clap::Parser;

/// Server configuration.
///
/// This struct can be constructed from environment variables using [`ServerConfig::from_env`],
/// from command line arguments using [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "tabula")]
#[command(about = "Multi-tenant JSON API server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "TABULA_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "TABULA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TABULA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "TABULA_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "TABULA_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "TABULA_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "TABULA_CORS_METHODS",
        default_value = "GET,POST,PUT,PATCH,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "TABULA_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept"
    )]
    pub cors_headers: String,

    /// SQLite database file. An in-memory database is used when unset.
    #[arg(long, env = "TABULA_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory holding `schema_*.json` table configuration files.
    #[arg(long, env = "TABULA_SCHEMA_DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Static files served by the dashboard application for non-API paths.
    #[arg(long, env = "TABULA_DASHBOARD_ROOT")]
    pub dashboard_root: Option<PathBuf>,

    /// Default page size for list requests.
    #[arg(long, env = "TABULA_DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: usize,

    /// Maximum page size for list requests.
    #[arg(long, env = "TABULA_MAX_PAGE_SIZE", default_value = "500")]
    pub max_page_size: usize,

    /// Email of the account the bootstrap token is issued to.
    #[arg(long, env = "TABULA_BOOTSTRAP_EMAIL", default_value = "admin@localhost")]
    pub bootstrap_email: String,

    /// API token for the bootstrap account, created at boot if missing.
    #[arg(long, env = "TABULA_BOOTSTRAP_TOKEN", hide_env_values = true)]
    pub bootstrap_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,PATCH,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept".to_string(),
            database_url: None,
            schema_dir: None,
            dashboard_root: None,
            default_page_size: 20,
            max_page_size: 500,
            bootstrap_email: "admin@localhost".to_string(),
            bootstrap_token: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        Self::try_parse_from(["tabula"]).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Clamps a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if let Some(dir) = &self.schema_dir {
            if !dir.is_dir() {
                errors.push(format!("Schema directory {} does not exist", dir.display()));
            }
        }

        if self.bootstrap_token.as_deref().is_some_and(str::is_empty) {
            errors.push("Bootstrap token cannot be empty".to_string());
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
    /// with tests.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            log_level: "debug".to_string(),
            request_timeout: 5,
            enable_cors: false,
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.enable_cors);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 3000,
            host: "0.0.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().iter().any(|e| e.contains("Port")));
    }

    #[test]
    fn test_validate_invalid_page_sizes() {
        let config = ServerConfig {
            default_page_size: 100,
            max_page_size: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_missing_schema_dir() {
        let config = ServerConfig {
            schema_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Schema directory")));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.page_size(None), 10);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(1000)), 100);
    }

    #[test]
    fn test_for_testing() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.port, 0);
        assert!(!config.enable_cors);
    }
}
