//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::gather::{DEFAULT_LIMIT, MAX_LIMIT, PaginationBounds};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Page size when a request names none (default: 20).
    pub page_default_limit: u64,

    /// Largest page size a request may ask for (default: 100).
    pub page_max_limit: u64,

    /// Spell CSV read by `import-spells` when no `--file` is given.
    pub spells_csv: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let page_default_limit = env::var("PAGE_DEFAULT_LIMIT")
            .unwrap_or_else(|_| DEFAULT_LIMIT.to_string())
            .parse()
            .context("PAGE_DEFAULT_LIMIT must be a valid u64")?;

        let page_max_limit = env::var("PAGE_MAX_LIMIT")
            .unwrap_or_else(|_| MAX_LIMIT.to_string())
            .parse()
            .context("PAGE_MAX_LIMIT must be a valid u64")?;

        let spells_csv = env::var("SPELLS_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/spells.csv"));

        let config = Self {
            port,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            page_default_limit,
            page_max_limit,
            spells_csv,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.page_max_limit == 0 {
            bail!("PAGE_MAX_LIMIT must be at least 1");
        }
        if self.page_default_limit == 0 || self.page_default_limit > self.page_max_limit {
            bail!(
                "PAGE_DEFAULT_LIMIT must be between 1 and PAGE_MAX_LIMIT ({})",
                self.page_max_limit
            );
        }
        Ok(())
    }

    pub fn pagination_bounds(&self) -> PaginationBounds {
        PaginationBounds {
            default_limit: self.page_default_limit,
            max_limit: self.page_max_limit,
        }
    }
}
