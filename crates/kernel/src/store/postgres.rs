//! PostgreSQL store.

use async_trait::async_trait;
use sea_query::{
    Alias, Expr, LockType, OnConflict, PostgresQueryBuilder, Query, SimpleExpr, Value,
};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{Store, UpsertBatch, WriteTx};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::gather::plan::POSITION;
use crate::gather::query_builder::{self, scalar_value};
use crate::gather::{ID_COLUMN, KEY_COLUMN, QueryPlan};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Wrap a fetch query so each row arrives as one JSON object. A subquery's
/// order is not kept by the outer select, so rows are re-ordered by page
/// position.
fn json_rows(sql: &str) -> String {
    format!("SELECT row_to_json(t) FROM ({sql}) t ORDER BY t.\"{POSITION}\"")
}

fn to_count(total: i64) -> u64 {
    u64::try_from(total).unwrap_or(0)
}

/// Build the `INSERT … ON CONFLICT (key) DO UPDATE` statement for a batch.
pub fn build_upsert(batch: &UpsertBatch) -> AppResult<String> {
    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(batch.table))
        .columns(batch.columns.iter().map(|c| Alias::new(*c)));

    for row in &batch.rows {
        let cells: Vec<SimpleExpr> = row
            .iter()
            .map(|cell| match cell {
                Some(value) => scalar_value(value).into(),
                None => Value::Int(None).into(),
            })
            .collect();
        insert
            .values(cells)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("invalid upsert row")))?;
    }

    insert.on_conflict(
        OnConflict::column(Alias::new(batch.key_column))
            .update_columns(batch.update_columns.iter().map(|c| Alias::new(*c)))
            .to_owned(),
    );

    Ok(insert.to_string(PostgresQueryBuilder))
}

/// `(slug, id)` pairs of a table, key-share locked so referenced rows cannot
/// be deleted before the transaction ends.
pub fn build_key_index(table: &str) -> String {
    Query::select()
        .column(Alias::new(KEY_COLUMN))
        .expr(Expr::cust(format!("\"{ID_COLUMN}\"::BIGINT")))
        .from(Alias::new(table))
        .lock(LockType::KeyShare)
        .to_string(PostgresQueryBuilder)
}

struct PgWriteTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl WriteTx for PgWriteTx {
    async fn key_index(&mut self, table: &'static str) -> AppResult<Vec<(String, i64)>> {
        let sql = build_key_index(table);
        let pairs = sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(pairs)
    }

    async fn upsert(&mut self, batch: &UpsertBatch) -> AppResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let sql = build_upsert(batch)?;
        debug!(table = batch.table, rows = batch.rows.len(), "upsert");
        let result = sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, plan: &QueryPlan) -> AppResult<u64> {
        let sql = query_builder::build_count(plan);
        debug!(table = plan.table, sql = %sql, "count query");
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(to_count(total))
    }

    async fn fetch_rows(&self, plan: &QueryPlan) -> AppResult<Vec<JsonValue>> {
        let sql = json_rows(&query_builder::build_fetch(plan));
        debug!(table = plan.table, sql = %sql, "fetch query");
        let rows = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Runs both plans in one read-only snapshot.
    async fn count_and_fetch(
        &self,
        count: &QueryPlan,
        fetch: &QueryPlan,
    ) -> AppResult<(u64, Vec<JsonValue>)> {
        let count_sql = query_builder::build_count(count);
        let fetch_sql = json_rows(&query_builder::build_fetch(fetch));
        debug!(table = count.table, count_sql = %count_sql, fetch_sql = %fetch_sql, "page queries");

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        let total: i64 = sqlx::query_scalar(&count_sql).fetch_one(&mut *tx).await?;
        let rows: Vec<JsonValue> = sqlx::query_scalar(&fetch_sql).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok((to_count(total), rows))
    }

    async fn begin_write(&self) -> AppResult<Box<dyn WriteTx + '_>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgWriteTx { tx }))
    }

    async fn is_healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }
}
