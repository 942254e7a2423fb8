use std::path::PathBuf;

use anyhow::Context;

/// Process-wide configuration, read from the environment exactly once at
/// startup and injected from there. The signing secret and database path
/// have no safe defaults, so their absence is fatal here instead of
/// surfacing per request.
pub struct Config {
    pub token_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let token_secret =
            std::env::var("PARLEY_TOKEN_SECRET").context("PARLEY_TOKEN_SECRET must be set")?;
        let db_path: PathBuf = std::env::var("PARLEY_DB_PATH")
            .context("PARLEY_DB_PATH must be set")?
            .into();
        let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PARLEY_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;

        Ok(Self {
            token_secret,
            db_path,
            host,
            port,
        })
    }
}
