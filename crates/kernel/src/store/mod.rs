//! Persistence collaborator.
//!
//! Handlers and the importer talk to storage only through [`Store`]. The
//! Postgres implementation compiles plans to SQL; tests plug in an in-memory
//! store that executes plans directly.

mod postgres;

pub use postgres::{PgStore, build_key_index, build_upsert};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppResult;
use crate::gather::{QueryPlan, Scalar};

/// A multi-row insert-or-update keyed by a unique column.
///
/// On conflict only `update_columns` are overwritten from the incoming row.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertBatch {
    pub table: &'static str,
    pub key_column: &'static str,
    pub columns: Vec<&'static str>,
    pub update_columns: Vec<&'static str>,
    /// One cell per column, in `columns` order. `None` is SQL NULL.
    pub rows: Vec<Vec<Option<Scalar>>>,
}

impl UpsertBatch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Evaluate a count plan.
    async fn count(&self, plan: &QueryPlan) -> AppResult<u64>;

    /// Evaluate a fetch plan, returning raw rows with a `position`, a root node
    /// and one node per eager relation.
    async fn fetch_rows(&self, plan: &QueryPlan) -> AppResult<Vec<Value>>;

    /// Evaluate both plans. Stores without snapshots run them back to back, so
    /// a concurrent write can make the total and the page disagree.
    async fn count_and_fetch(
        &self,
        count: &QueryPlan,
        fetch: &QueryPlan,
    ) -> AppResult<(u64, Vec<Value>)> {
        let total = self.count(count).await?;
        let rows = self.fetch_rows(fetch).await?;
        Ok((total, rows))
    }

    /// Open a write transaction.
    async fn begin_write(&self) -> AppResult<Box<dyn WriteTx + '_>>;

    async fn is_healthy(&self) -> bool;
}

/// A write transaction. Dropping it without [`WriteTx::commit`] rolls back.
#[async_trait]
pub trait WriteTx: Send {
    /// All `(slug, id)` pairs of a reference table. The rows stay locked
    /// against deletion until the transaction ends.
    async fn key_index(&mut self, table: &'static str) -> AppResult<Vec<(String, i64)>>;

    /// Apply an upsert. Returns the number of rows written.
    async fn upsert(&mut self, batch: &UpsertBatch) -> AppResult<u64>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
