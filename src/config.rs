//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Relay Behaviour
//!
//! - `DEFAULT_TIMEOUT_MS`: Outbound timeout when the caller sets none (default: 30000)
//! - `MAX_TIMEOUT_MS`: Clamp for caller-supplied timeouts (default: 120000)
//! - `STATUS_MODE`: `envelope` (always 200 for destination replies) or `mirror`
//! - `WEBHOOK_URL` / `WEBHOOK_AUTH`: Fallback destination used only when a
//!   request carries no destination of its own
//!
//! # Security Configuration
//!
//! - `ALLOW_PRIVATE_DESTINATIONS`: Disable the private-network denylist (default: false)
//! - `CORS_ALLOWED_ORIGINS`: Comma-separated list of allowed origins (default: `*`)
//!
//! # Multipart Limits
//!
//! - `MAX_ATTACHMENTS`: Maximum files per request (default: 5)
//! - `MAX_ATTACHMENT_SIZE`: Maximum bytes per file (default: 10MB)
//! - `MAX_FIELDS`: Maximum text fields per request (default: 20)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::{DEFAULT_TIMEOUT_MS, FallbackDirective, MAX_TIMEOUT_MS};

/// How destination replies map to the relay's own HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusMode {
    /// The relay answers 200 whenever the destination replied; the
    /// destination status is carried inside the envelope.
    #[default]
    Envelope,
    /// The relay answers with the destination's status code, except for
    /// statuses that cannot carry a body (1xx, 204, 205, 304), which map to 200.
    Mirror,
}

impl FromStr for StatusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "envelope" => Ok(StatusMode::Envelope),
            "mirror" => Ok(StatusMode::Mirror),
            other => Err(format!("expected 'envelope' or 'mirror', got '{other}'")),
        }
    }
}

impl fmt::Display for StatusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMode::Envelope => write!(f, "envelope"),
            StatusMode::Mirror => write!(f, "mirror"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Maximum inbound request body size in bytes (default: 60MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Relay Configuration
    // =========================================================================
    /// Outbound timeout applied when the caller does not supply one
    pub default_timeout: Duration,

    /// Upper bound for caller-supplied timeouts
    pub max_timeout: Duration,

    /// Status mapping for destination replies
    pub status_mode: StatusMode,

    /// `User-Agent` sent to destinations
    pub user_agent: String,

    /// Maximum destination response body size in bytes (default: 50MB)
    pub max_upstream_response_size: usize,

    /// Destination used when a request names none
    pub fallback_destination: Option<String>,

    /// Auth token used when a request supplies none
    pub fallback_auth: Option<String>,

    // =========================================================================
    // Multipart Limits
    // =========================================================================
    /// Maximum number of file attachments per request (default: 5)
    pub max_attachments: usize,

    /// Maximum size of a single attachment in bytes (default: 10MB)
    pub max_attachment_size: usize,

    /// Maximum number of text fields per request (default: 20)
    pub max_fields: usize,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Skip the private-network destination denylist.
    /// Only for local development and tests.
    pub allow_private_destinations: bool,

    /// Comma-separated list of allowed CORS origins
    /// Use "*" to allow all origins (the relay exists to serve browsers)
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration is invalid
    /// (e.g., non-numeric PORT value, default timeout above the maximum).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: Self::parse_env("PORT", defaults.port)?,
            max_request_body_size: Self::parse_env(
                "MAX_REQUEST_BODY_SIZE",
                defaults.max_request_body_size,
            )?,

            // Relay
            default_timeout: Duration::from_millis(Self::parse_env(
                "DEFAULT_TIMEOUT_MS",
                DEFAULT_TIMEOUT_MS,
            )?),
            max_timeout: Duration::from_millis(Self::parse_env("MAX_TIMEOUT_MS", MAX_TIMEOUT_MS)?),
            status_mode: Self::parse_env("STATUS_MODE", defaults.status_mode)?,
            user_agent: env::var("RELAY_USER_AGENT")
                .ok()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            max_upstream_response_size: Self::parse_env(
                "MAX_UPSTREAM_RESPONSE_SIZE",
                defaults.max_upstream_response_size,
            )?,
            fallback_destination: Self::optional_env("WEBHOOK_URL"),
            fallback_auth: Self::optional_env("WEBHOOK_AUTH"),

            // Multipart limits
            max_attachments: Self::parse_env("MAX_ATTACHMENTS", defaults.max_attachments)?,
            max_attachment_size: Self::parse_env(
                "MAX_ATTACHMENT_SIZE",
                defaults.max_attachment_size,
            )?,
            max_fields: Self::parse_env("MAX_FIELDS", defaults.max_fields)?,

            // Security
            allow_private_destinations: Self::parse_env("ALLOW_PRIVATE_DESTINATIONS", false)?,
            cors_allowed_origins: Self::parse_cors_origins(),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            metrics_port: Self::parse_env("METRICS_PORT", defaults.metrics_port)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.default_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "DEFAULT_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.default_timeout > self.max_timeout {
            return Err(AppError::ConfigError(format!(
                "DEFAULT_TIMEOUT_MS ({:?}) must be <= MAX_TIMEOUT_MS ({:?})",
                self.default_timeout, self.max_timeout
            )));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.max_attachment_size > self.max_request_body_size {
            return Err(AppError::ConfigError(format!(
                "MAX_ATTACHMENT_SIZE ({}) must be <= MAX_REQUEST_BODY_SIZE ({})",
                self.max_attachment_size, self.max_request_body_size
            )));
        }

        if self.max_upstream_response_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_UPSTREAM_RESPONSE_SIZE must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.fallback_destination
            && url::Url::parse(url).is_err()
        {
            return Err(AppError::ConfigError(format!(
                "WEBHOOK_URL is not a valid URL: {url}"
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured fallback destination and auth.
    pub fn fallback_directive(&self) -> FallbackDirective {
        FallbackDirective {
            destination_url: self.fallback_destination.clone(),
            auth_token: self.fallback_auth.clone(),
        }
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Read an optional, non-empty environment variable.
    fn optional_env(name: &str) -> Option<String> {
        env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parse CORS allowed origins from environment variable.
    fn parse_cors_origins() -> Vec<String> {
        env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_request_body_size: 60 * 1024 * 1024, // 60MB
            // Relay
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_timeout: Duration::from_millis(MAX_TIMEOUT_MS),
            status_mode: StatusMode::Envelope,
            user_agent: format!("webhook-relay/{}", env!("CARGO_PKG_VERSION")),
            max_upstream_response_size: 50 * 1024 * 1024, // 50MB
            fallback_destination: None,
            fallback_auth: None,
            // Multipart limits
            max_attachments: 5,
            max_attachment_size: 10 * 1024 * 1024, // 10MB
            max_fields: 20,
            // Security
            allow_private_destinations: false,
            cors_allowed_origins: vec!["*".to_string()],
            // Observability
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.default_timeout, Duration::from_secs(30));
        assert_eq!(config.max_timeout, Duration::from_secs(120));
        assert_eq!(config.status_mode, StatusMode::Envelope);
        assert_eq!(config.max_attachments, 5);
        assert_eq!(config.max_fields, 20);
        assert!(!config.allow_private_destinations);
        assert!(config.fallback_destination.is_none());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "localhost".to_string(),
            port: 3000,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "localhost:3000");
    }

    #[test]
    fn test_status_mode_parsing() {
        assert_eq!("envelope".parse::<StatusMode>(), Ok(StatusMode::Envelope));
        assert_eq!(" MIRROR ".parse::<StatusMode>(), Ok(StatusMode::Mirror));
        assert!("echo".parse::<StatusMode>().is_err());
    }

    #[test]
    fn test_validate_timeout_ordering() {
        let config = Config {
            default_timeout: Duration::from_secs(200),
            max_timeout: Duration::from_secs(120),
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DEFAULT_TIMEOUT_MS"));
    }

    #[test]
    fn test_validate_attachment_size_within_body_limit() {
        let config = Config {
            max_request_body_size: 1024,
            max_attachment_size: 4096,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("MAX_ATTACHMENT_SIZE"));
    }

    #[test]
    fn test_validate_rejects_bad_fallback_url() {
        let config = Config {
            fallback_destination: Some("not a url".to_string()),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fallback_directive() {
        let config = Config {
            fallback_destination: Some("https://hooks.example.com/in".to_string()),
            fallback_auth: Some("secret".to_string()),
            ..Config::default()
        };

        let fallback = config.fallback_directive();
        assert_eq!(
            fallback.destination_url.as_deref(),
            Some("https://hooks.example.com/in")
        );
        assert_eq!(fallback.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_metrics_addr_disabled_by_default() {
        let config = Config::default();
        assert!(!config.metrics_enabled());
        assert!(config.metrics_addr().is_none());

        let config = Config {
            metrics_port: 9090,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }
}
