use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

/// Used when `MINDPING_JWT_SECRET` is unset. Fine for local runs only.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Server settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// `None` keeps the store in memory for the life of the process.
    pub db_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("MINDPING_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("MINDPING_PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .context("MINDPING_PORT must be a port number")?;

        let jwt_secret = std::env::var("MINDPING_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEV_JWT_SECRET.into());
        if jwt_secret == DEV_JWT_SECRET {
            warn!("MINDPING_JWT_SECRET is unset, using the development secret");
        }

        let db_path = std::env::var("MINDPING_DB_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            port,
            jwt_secret,
            db_path,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
