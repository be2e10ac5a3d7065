//! Configuration management for the upload engine
//!
//! Settings are read once at startup from the process environment
//! (optionally seeded from a `.env` file by the binary).

use std::env;

use crate::error::ConfigError;

/// Default ledger location when `DATABASE_URL` is unset
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./uploads.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_key = var("S3_ACCESS_KEY");
        let secret_key = var("S3_SECRET_KEY");
        match (&access_key, &secret_key) {
            (Some(_), None) => return Err(ConfigError::Missing("S3_SECRET_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("S3_ACCESS_KEY")),
            _ => {}
        }

        let endpoint = var("S3_ENDPOINT");
        if let Some(url) = &endpoint {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    name: "S3_ENDPOINT",
                    value: url.clone(),
                });
            }
        }

        Ok(Config {
            storage: StorageConfig {
                bucket: var("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?,
                region: var("S3_REGION").ok_or(ConfigError::Missing("S3_REGION"))?,
                endpoint,
                access_key,
                secret_key,
            },
            ledger: LedgerConfig {
                url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            },
        })
    }
}
