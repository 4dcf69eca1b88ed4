//! Environment-driven application configuration

use thiserror::Error;

const PRODUCTION_URL: &str = "https://svcs.ebay.com/services/search/FindingService/v1";
const SANDBOX_URL: &str = "https://svcs.sandbox.ebay.com/services/search/FindingService/v1";

const DEV_SECRET_KEY: &str = "dev-secret-key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("SECRET_KEY must be set in production")]
    DefaultSecretInProduction,

    #[error("EBAY_API_KEY is not configured")]
    MissingApiKey,

    #[error("Invalid EBAY_API_KEY format")]
    InvalidApiKeyFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" => Environment::Production,
            "testing" => Environment::Testing,
            _ => Environment::Development,
        }
    }
}

/// Application configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub secret_key: String,
    pub database_path: String,
    pub ebay_api_key: Option<String>,
    pub ebay_use_sandbox: bool,
    pub cors_origins: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub token_ttl_secs: i64,
}

impl AppConfig {
    /// Build the configuration from environment variables. Call after
    /// `dotenvy::dotenv()`. Production refuses the development secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::parse(
            &std::env::var("FLIPLENS_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let secret_key =
            std::env::var("SECRET_KEY").unwrap_or_else(|_| DEV_SECRET_KEY.to_string());
        if environment == Environment::Production && secret_key == DEV_SECRET_KEY {
            return Err(ConfigError::DefaultSecretInProduction);
        }

        let ebay_api_key = std::env::var("EBAY_API_KEY").ok().filter(|k| !k.is_empty());
        if let Some(key) = &ebay_api_key {
            if !validate_api_key_format(key) {
                return Err(ConfigError::InvalidApiKeyFormat);
            }
        } else if environment == Environment::Production {
            // Search is a core surface; refuse to boot production without it
            return Err(ConfigError::MissingApiKey);
        }

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            environment,
            secret_key,
            database_path: std::env::var("FLIPLENS_DB_PATH")
                .unwrap_or_else(|_| "data/fliplens.db".to_string()),
            ebay_api_key,
            ebay_use_sandbox: env_bool("EBAY_USE_SANDBOX", true),
            cors_origins,
            rate_limit_enabled: env_bool("RATE_LIMIT_ENABLED", true),
            rate_limit_requests: env_parse("RATE_LIMIT_REQUESTS", 500),
            rate_limit_window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 3600),
            token_ttl_secs: env_parse("TOKEN_TTL_SECS", 86400),
        })
    }

    /// Marketplace base URL for the configured sandbox/production mode
    pub fn ebay_base_url(&self) -> &'static str {
        if self.ebay_use_sandbox {
            SANDBOX_URL
        } else {
            PRODUCTION_URL
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn environment_name(&self) -> &'static str {
        match self.environment {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }
}

/// API keys are at least 10 chars of `[A-Za-z0-9._-]`
pub fn validate_api_key_format(key: &str) -> bool {
    key.len() >= 10
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => value.to_lowercase() == "true",
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_format_rules() {
        assert!(validate_api_key_format("FlipLens-Prod-1234567890"));
        assert!(validate_api_key_format("abc.def_123-456"));
        assert!(!validate_api_key_format("short"));
        assert!(!validate_api_key_format("has spaces not allowed"));
        assert!(!validate_api_key_format("semi;colon;key"));
    }

    #[test]
    fn environment_parsing_defaults_to_development() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("TESTING"), Environment::Testing);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }
}
