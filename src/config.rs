use thiserror::Error;
use tracing::warn;

/// Origins allowed by the CORS layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Application settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,

    /// Secret used to validate bearer tokens from the identity provider.
    pub jwt_secret: String,

    pub mailgun_api_key: String,
    pub mailgun_domain: String,
    pub emails_from_email: String,
    pub emails_from_name: String,

    /// Base URL used to build signing links in notification emails.
    pub frontend_url: String,

    pub cors_origins: CorsOrigins,
    pub environment: String,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Secrets (JWT_SECRET, Mailgun credentials) are required; everything
    /// else falls back to a default with a warning on malformed values.
    pub fn from_env() -> Result<Settings, ConfigError> {
        let jwt_secret = require("JWT_SECRET")?;
        let mailgun_api_key = require("MAILGUN_API_KEY")?;
        let mailgun_domain = require("MAILGUN_DOMAIN")?;
        let emails_from_email = require("EMAILS_FROM_EMAIL")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/pantbrev.db".to_string());

        let database_max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => match raw.parse::<u32>() {
                Ok(value) if value >= 1 => value,
                _ => {
                    warn!(
                        "Invalid DATABASE_MAX_CONNECTIONS value '{}', using default: 5",
                        raw
                    );
                    5
                }
            },
            Err(_) => 5,
        };

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());

        let emails_from_name = std::env::var("EMAILS_FROM_NAME")
            .unwrap_or_else(|_| "Mortgage Deed System".to_string());

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let cors_origins = match std::env::var("BACKEND_CORS_ORIGINS") {
            Ok(raw) => Self::parse_cors_origins(&raw),
            Err(_) => CorsOrigins::Any,
        };

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Ok(Settings {
            database_url,
            database_max_connections,
            bind_addr,
            jwt_secret,
            mailgun_api_key,
            mailgun_domain,
            emails_from_email,
            emails_from_name,
            frontend_url,
            cors_origins,
            environment,
        })
    }

    /// Parse a comma-separated origin list, with `*` meaning any origin.
    pub fn parse_cors_origins(raw: &str) -> CorsOrigins {
        if raw.trim() == "*" {
            return CorsOrigins::Any;
        }

        let origins: Vec<String> = raw
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        if origins.is_empty() {
            warn!("BACKEND_CORS_ORIGINS contained no origins, allowing any origin");
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cors_origins_wildcard() {
        assert_eq!(Settings::parse_cors_origins("*"), CorsOrigins::Any);
        assert_eq!(Settings::parse_cors_origins(" * "), CorsOrigins::Any);
    }

    #[test]
    fn test_parse_cors_origins_list() {
        let parsed =
            Settings::parse_cors_origins("https://app.example.com, https://admin.example.com");
        assert_eq!(
            parsed,
            CorsOrigins::List(vec![
                "https://app.example.com".to_string(),
                "https://admin.example.com".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_cors_origins_empty_falls_back_to_any() {
        assert_eq!(Settings::parse_cors_origins(" , ,"), CorsOrigins::Any);
    }
}
