use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration. Built once in `main` and carried inside
/// `AppState` so handlers and tests receive it explicitly instead of
/// reaching for a process-wide singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub query: QueryConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub payments: PaymentsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default page size when the request carries no `limit`
    pub default_limit: i64,
    /// Hard cap applied to any requested `limit`
    pub max_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Development convenience: return password-reset tokens in the API
    /// response instead of delivering them out of band.
    pub expose_reset_tokens: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Hosted-checkout endpoint of the payment provider
    pub checkout_url: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Shared secret expected in the checkout-completed webhook header
    pub webhook_secret: String,
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("QUERY_DEFAULT_LIMIT") {
            self.query.default_limit = v.parse().unwrap_or(self.query.default_limit);
        }
        if let Ok(v) = env::var("QUERY_MAX_LIMIT") {
            self.query.max_limit = v.parse().unwrap_or(self.query.max_limit);
        }

        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs = v.parse().unwrap_or(self.database.connect_timeout_secs);
        }

        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(v) = env::var("PAYMENTS_CHECKOUT_URL") {
            self.payments.checkout_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_SUCCESS_URL") {
            self.payments.success_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_CANCEL_URL") {
            self.payments.cancel_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_WEBHOOK_SECRET") {
            self.payments.webhook_secret = v;
        }
        if let Ok(v) = env::var("PAYMENTS_CURRENCY") {
            self.payments.currency = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            query: QueryConfig {
                default_limit: 10,
                max_limit: 1000,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connect_timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret: "dev-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7,
                expose_reset_tokens: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            payments: PaymentsConfig {
                checkout_url: "http://localhost:4242/v1/checkout/sessions".to_string(),
                success_url: "http://localhost:3000/my-tours".to_string(),
                cancel_url: "http://localhost:3000/tours".to_string(),
                webhook_secret: "dev-webhook-secret".to_string(),
                currency: "usd".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            query: QueryConfig {
                default_limit: 10,
                max_limit: 500,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connect_timeout_secs: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                expose_reset_tokens: false,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            payments: PaymentsConfig {
                checkout_url: String::new(),
                success_url: "https://staging.example.com/my-tours".to_string(),
                cancel_url: "https://staging.example.com/tours".to_string(),
                webhook_secret: String::new(),
                currency: "usd".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            query: QueryConfig {
                default_limit: 10,
                max_limit: 100,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connect_timeout_secs: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                expose_reset_tokens: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            payments: PaymentsConfig {
                checkout_url: String::new(),
                success_url: "https://app.example.com/my-tours".to_string(),
                cancel_url: "https://app.example.com/tours".to_string(),
                webhook_secret: String::new(),
                currency: "usd".to_string(),
            },
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.query.default_limit, 10);
        assert_eq!(config.query.max_limit, 1000);
        assert!(config.security.expose_reset_tokens);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.query.max_limit, 100);
        assert!(!config.security.expose_reset_tokens);
        assert!(config.security.jwt_secret.is_empty());
    }
}
