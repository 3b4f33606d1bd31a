//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::gather::PaginationBounds;
use crate::resources::Registries;
use crate::store::{PgStore, Store};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Persistence collaborator.
    store: Arc<dyn Store>,

    /// Field registries, read-only after startup.
    registries: Registries,

    /// Page-size bounds applied to every request.
    pagination: PaginationBounds,
}

impl AppState {
    /// Connect to PostgreSQL and build the registries.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config).await?;
        info!(
            max_connections = config.database_max_connections,
            "database pool ready"
        );
        Self::from_parts(Arc::new(PgStore::new(pool)), config.pagination_bounds())
    }

    /// Build state around an existing store.
    pub fn from_parts(store: Arc<dyn Store>, pagination: PaginationBounds) -> Result<Self> {
        let registries = Registries::build().context("invalid field registry")?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                store,
                registries,
                pagination,
            }),
        })
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub fn registries(&self) -> &Registries {
        &self.inner.registries
    }

    pub fn pagination(&self) -> PaginationBounds {
        self.inner.pagination
    }
}
