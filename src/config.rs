use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    // Check-in location acceptance
    pub required_accuracy_m: f64,
    pub location_max_duration_ms: u64,

    pub schedule_cache_ttl_secs: u64,
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("{key} must be set"))
}

fn or_default<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{key} has an invalid value"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: or_default("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: or_default("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: or_default("RATE_LOGIN_PER_MIN", "60")?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: or_default("LOG_LEVEL", "debug")?,

            required_accuracy_m: or_default("REQUIRED_ACCURACY_M", "80")?,
            location_max_duration_ms: or_default("LOCATION_MAX_DURATION_MS", "10000")?,

            schedule_cache_ttl_secs: or_default("SCHEDULE_CACHE_TTL_SECS", "300")?,
        })
    }
}
