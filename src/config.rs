use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::biometric::{DEFAULT_MIN_MATCH_SCORE, DEFAULT_MIN_SCAN_QUALITY, MatchPolicy};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_scan_per_min: u32,
    pub rate_protected_per_min: u32,

    // Fingerprint matching
    pub min_match_score: u8,
    pub min_scan_quality: u8,

    /// Lifetime of cached sites and job types
    pub reference_cache_ttl_secs: u64,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a local `.env`.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_scan_per_min: parsed("RATE_SCAN_PER_MIN", 120)?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", 1000)?,

            min_match_score: parsed("MIN_MATCH_SCORE", DEFAULT_MIN_MATCH_SCORE)?,
            min_scan_quality: parsed("MIN_SCAN_QUALITY", DEFAULT_MIN_SCAN_QUALITY)?,

            reference_cache_ttl_secs: parsed("REFERENCE_CACHE_TTL_SECS", 300)?,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: parsed("LOG_LEVEL", tracing::Level::DEBUG)?,
        };

        if config.min_match_score > 100 || config.min_scan_quality > 100 {
            anyhow::bail!("MIN_MATCH_SCORE and MIN_SCAN_QUALITY must be within 0-100");
        }
        Ok(config)
    }

    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy {
            min_match_score: self.min_match_score,
            min_scan_quality: self.min_scan_quality,
        }
    }
}
