use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8080)
    pub port: u16,
    pub database: DatabaseConfig,
    pub clerk: ClerkConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite database URL (default: sqlite:./data/quill.db)
    pub url: String,
}

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct ClerkConfig {
    /// Backend API base URL (default: https://api.clerk.com)
    pub api_base: String,
    /// Backend API key used for metadata write-back
    pub secret_key: String,
    /// OIDC issuer URL for session token validation
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared webhook signing secret (whsec_...)
    pub signing_secret: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// CORS allowed origins (comma-separated, default: *)
    pub origins: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing required variables abort startup; the service must never
    /// serve traffic with an absent webhook secret or provider key.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./data/quill.db".to_string()),
            },
            clerk: ClerkConfig {
                api_base: env::var("CLERK_API_BASE")
                    .unwrap_or_else(|_| "https://api.clerk.com".to_string()),
                secret_key: required("CLERK_SECRET_KEY")?,
                issuer: required("CLERK_ISSUER")?,
            },
            webhook: WebhookConfig {
                signing_secret: required("CLERK_WEBHOOK_SIGNING_SECRET")?,
            },
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            cors: CorsConfig {
                origins: env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            },
        })
    }
}

/// Read a required variable, treating an empty value as missing.
fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(name)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid port number")]
    InvalidPort,
}
