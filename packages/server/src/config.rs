use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::domains::messaging::{DispatcherPolicy, FailurePolicy};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_number: String,
    pub dispatch_batch_limit: i64,
    pub default_template_name: String,
    pub dispatch_failure_policy: FailurePolicy,
    pub credential_cache_ttl_minutes: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "tripforge".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_whatsapp_number: env::var("TWILIO_WHATSAPP_NUMBER")
                .unwrap_or_else(|_| "whatsapp:+14155238886".to_string()),
            dispatch_batch_limit: env::var("DISPATCH_BATCH_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("DISPATCH_BATCH_LIMIT must be a valid number")?,
            default_template_name: env::var("DEFAULT_TEMPLATE_NAME")
                .unwrap_or_else(|_| "scheduled_reminder".to_string()),
            dispatch_failure_policy: env::var("DISPATCH_FAILURE_POLICY")
                .unwrap_or_else(|_| "mark-sent".to_string())
                .parse()
                .context("DISPATCH_FAILURE_POLICY must be 'mark-sent' or 'retry'")?,
            credential_cache_ttl_minutes: env::var("CREDENTIAL_CACHE_TTL_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("CREDENTIAL_CACHE_TTL_MINUTES must be a valid number")?,
        })
    }

    /// Dispatcher policy knobs derived from this configuration
    pub fn dispatcher_policy(&self) -> DispatcherPolicy {
        DispatcherPolicy {
            batch_limit: self.dispatch_batch_limit,
            default_template_name: self.default_template_name.clone(),
            on_failure: self.dispatch_failure_policy,
        }
    }
}
