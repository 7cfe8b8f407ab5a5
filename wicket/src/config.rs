//! Environment-driven configuration
//!
//! All settings come from `WICKET_`-prefixed environment variables.
//! Secrets, the database URL, and the mail from-address are required;
//! only the app URL and deployment mode have development defaults.

use wicket_core::error::{ConfigError, Error};

/// Deployment mode. Production masks account-enumeration responses;
/// development surfaces them for easier debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// HMAC secret for access tokens.
    pub access_secret: String,
    /// HMAC secret for refresh tokens. Must differ from the access
    /// secret so the two token classes are not interchangeable.
    pub refresh_secret: String,
    pub database_url: String,
    /// Base URL embedded in verification and reset links.
    pub app_url: String,
    /// From address for outbound mail.
    pub mail_from: String,
    pub environment: Environment,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// `WICKET_ACCESS_SECRET`, `WICKET_REFRESH_SECRET`,
    /// `WICKET_DATABASE_URL`, and `WICKET_MAIL_FROM` are required;
    /// a missing key is a fatal configuration error, never defaulted.
    /// `WICKET_APP_URL` defaults to `http://localhost:3000` and
    /// `WICKET_ENV` to `development`.
    pub fn from_env() -> Result<Self, Error> {
        let access_secret = require("WICKET_ACCESS_SECRET")?;
        let refresh_secret = require("WICKET_REFRESH_SECRET")?;
        let database_url = require("WICKET_DATABASE_URL")?;
        let mail_from = require("WICKET_MAIL_FROM")?;

        if access_secret == refresh_secret {
            return Err(ConfigError::Invalid(
                "WICKET_REFRESH_SECRET".to_string(),
                "must differ from WICKET_ACCESS_SECRET".to_string(),
            )
            .into());
        }

        let environment = match std::env::var("WICKET_ENV").as_deref() {
            Ok("production") => Environment::Production,
            Ok("development") | Err(_) => Environment::Development,
            Ok(other) => {
                return Err(ConfigError::Invalid(
                    "WICKET_ENV".to_string(),
                    format!("expected production or development, got {other}"),
                )
                .into());
            }
        };

        Ok(Self {
            access_secret,
            refresh_secret,
            database_url,
            app_url: std::env::var("WICKET_APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mail_from,
            environment,
        })
    }

    /// A development configuration with fixed secrets, for tests and
    /// local tooling.
    pub fn for_development(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_secret: access_secret.to_string(),
            refresh_secret: refresh_secret.to_string(),
            database_url: "sqlite::memory:".to_string(),
            app_url: "http://localhost:3000".to_string(),
            mail_from: "no-reply@localhost".to_string(),
            environment: Environment::Development,
        }
    }
}

fn require(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name.to_string()).into()),
    }
}
