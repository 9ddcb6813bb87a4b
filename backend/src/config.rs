use anyhow::{Context, Result};
use std::env;

/// Server settings. Engine settings live in [`reconciler::EngineConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// `None` when `CORS_ALLOWED_ORIGINS` is unset
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok().map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        })
    }
}
