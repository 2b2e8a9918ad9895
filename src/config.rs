//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub payfast: PayfastConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Gateway deployment mode. Selects which base URL is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    Sandbox,
    Production,
}

/// PayFast merchant configuration.
///
/// Loaded once at startup into named fields; nothing here is mutated at
/// runtime and the auth token is never stored on this struct — tokens are
/// values returned by the gateway client and threaded through calls.
#[derive(Debug, Clone)]
pub struct PayfastConfig {
    pub api_url: String,
    pub sandbox_api_url: String,
    pub mode: GatewayMode,
    pub grant_type: String,
    pub merchant_id: String,
    pub secured_key: String,
    pub store_id: String,
    pub return_url: String,
    /// Basic-auth endpoint used by the pending-payment poller.
    pub transaction_check_url: String,
    pub admin_emails: Vec<String>,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            payfast: PayfastConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.payfast.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl PayfastConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match env::var("PAYFAST_MODE")
            .unwrap_or_else(|_| "sandbox".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => GatewayMode::Production,
            "sandbox" => GatewayMode::Sandbox,
            _ => return Err(ConfigError::InvalidValue("PAYFAST_MODE".to_string())),
        };

        Ok(PayfastConfig {
            api_url: env::var("PAYFAST_API_URL")
                .map_err(|_| ConfigError::MissingVariable("PAYFAST_API_URL".to_string()))?,
            sandbox_api_url: env::var("PAYFAST_SANDBOX_URL").unwrap_or_default(),
            mode,
            grant_type: env::var("PAYFAST_GRANT_TYPE")
                .unwrap_or_else(|_| "client_credentials".to_string()),
            merchant_id: env::var("PAYFAST_MERCHANT_ID")
                .map_err(|_| ConfigError::MissingVariable("PAYFAST_MERCHANT_ID".to_string()))?,
            secured_key: env::var("PAYFAST_SECURED_KEY")
                .map_err(|_| ConfigError::MissingVariable("PAYFAST_SECURED_KEY".to_string()))?,
            store_id: env::var("PAYFAST_STORE_ID").unwrap_or_default(),
            return_url: env::var("PAYFAST_RETURN_URL").unwrap_or_default(),
            transaction_check_url: env::var("PAYFAST_VERIFY_TRANSACTION").unwrap_or_default(),
            admin_emails: env::var("PAYFAST_ADMIN_EMAILS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            request_timeout_secs: env::var("PAYFAST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PAYFAST_TIMEOUT_SECS".to_string()))?,
        })
    }

    /// Base URL selected by the configured mode.
    pub fn base_url(&self) -> &str {
        match self.mode {
            GatewayMode::Production => &self.api_url,
            GatewayMode::Sandbox => {
                if self.sandbox_api_url.is_empty() {
                    &self.api_url
                } else {
                    &self.sandbox_api_url
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merchant_id.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PAYFAST_MERCHANT_ID cannot be empty".to_string(),
            ));
        }

        if self.secured_key.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PAYFAST_SECURED_KEY cannot be empty".to_string(),
            ));
        }

        let base = self.base_url();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PAYFAST_API_URL must be a valid URL".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PAYFAST_TIMEOUT_SECS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payfast_config() -> PayfastConfig {
        PayfastConfig {
            api_url: "https://ipguat.apps.net.pk/Ecommerce/api/Transaction/".to_string(),
            sandbox_api_url: String::new(),
            mode: GatewayMode::Sandbox,
            grant_type: "client_credentials".to_string(),
            merchant_id: "102".to_string(),
            secured_key: "zWHjBp2Bk0nMvpKW".to_string(),
            store_id: String::new(),
            return_url: "https://merchant.example.com/payfast/callback".to_string(),
            transaction_check_url: String::new(),
            admin_emails: vec!["ops@example.com".to_string()],
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn payfast_config_validates() {
        assert!(payfast_config().validate().is_ok());
    }

    #[test]
    fn empty_merchant_id_is_rejected() {
        let mut config = payfast_config();
        config.merchant_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn sandbox_mode_falls_back_to_api_url() {
        let config = payfast_config();
        assert_eq!(config.base_url(), config.api_url);
    }

    #[test]
    fn production_mode_uses_api_url() {
        let mut config = payfast_config();
        config.mode = GatewayMode::Production;
        config.sandbox_api_url = "https://sandbox.example.com/".to_string();
        assert_eq!(config.base_url(), config.api_url);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = payfast_config();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        assert!(config.validate().is_err());
    }
}
