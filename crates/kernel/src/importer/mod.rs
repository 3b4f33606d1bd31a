//! Batch upsert importer.
//!
//! Rows are projected and their references resolved by canonical key before
//! anything is written; the write itself is one insert-or-update statement
//! keyed by `slug`. Reference indexes are read inside the write transaction,
//! so the identities they resolve to still exist when the batch lands.

pub mod spells;

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::error::AppError;
use crate::gather::Scalar;
use crate::slug::slugify;
use crate::store::{UpsertBatch, WriteTx};

/// Import failures. Every variant except `Store` is raised before the write.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read import source: {0}")]
    Read(#[from] csv::Error),

    #[error("row {row}: {relation} '{key}' not found")]
    ReferenceNotFound {
        row: usize,
        relation: &'static str,
        key: String,
    },

    #[error("row {row}: name '{name}' yields an empty canonical key")]
    EmptyKey { row: usize, name: String },

    #[error("row {row}: '{key}' is not a canonical key")]
    InvalidKey { row: usize, key: String },

    #[error("canonical keys occur more than once: {}", .0.join(", "))]
    KeyCollision(Vec<String>),

    #[error(transparent)]
    Store(#[from] AppError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Abort when a canonical key occurs twice in one batch.
    pub reject_collisions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub rows: usize,
    pub written: u64,
    pub collisions: Vec<String>,
}

/// Canonical key to identity for one reference table.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    relation: &'static str,
    ids: HashMap<String, i64>,
}

impl ReferenceIndex {
    pub fn new(relation: &'static str, pairs: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self {
            relation,
            ids: pairs.into_iter().collect(),
        }
    }

    pub async fn load(
        tx: &mut dyn WriteTx,
        relation: &'static str,
        table: &'static str,
    ) -> Result<Self, ImportError> {
        let pairs = tx.key_index(table).await?;
        Ok(Self::new(relation, pairs))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identity of the entry whose key is `slugify(display)`.
    pub fn resolve(&self, row: usize, display: &str) -> Result<i64, ImportError> {
        let key = slugify(display);
        self.ids
            .get(&key)
            .copied()
            .ok_or(ImportError::ReferenceNotFound {
                row,
                relation: self.relation,
                key,
            })
    }
}

/// A projected row ready for the write.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub key: String,
    /// One cell per target column.
    pub cells: Vec<Option<Scalar>>,
}

/// Where and how rows are written.
#[derive(Debug, Clone, Copy)]
pub struct UpsertTarget {
    pub table: &'static str,
    pub key_column: &'static str,
    pub columns: &'static [&'static str],
    /// Overwritten on conflict; every other column keeps its stored value.
    pub update_columns: &'static [&'static str],
}

/// Keys occurring more than once, in order of first repetition.
pub fn find_collisions<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut repeated = Vec::new();
    for key in keys {
        let count = counts.entry(key).or_default();
        *count += 1;
        if *count == 2 {
            repeated.push(key.to_string());
        }
    }
    repeated
}

/// Write prepared rows as one upsert inside `tx`. The caller commits.
pub async fn write_batch(
    tx: &mut dyn WriteTx,
    target: &UpsertTarget,
    rows: Vec<ImportRow>,
    options: ImportOptions,
) -> Result<ImportReport, ImportError> {
    let collisions = find_collisions(rows.iter().map(|r| r.key.as_str()));
    if !collisions.is_empty() {
        warn!(
            table = target.table,
            collisions = ?collisions,
            "canonical key collisions in import batch"
        );
        if options.reject_collisions {
            return Err(ImportError::KeyCollision(collisions));
        }
    }

    let row_count = rows.len();
    let batch = UpsertBatch {
        table: target.table,
        key_column: target.key_column,
        columns: target.columns.to_vec(),
        update_columns: target.update_columns.to_vec(),
        rows: rows.into_iter().map(|r| r.cells).collect(),
    };
    let written = tx.upsert(&batch).await?;

    info!(
        table = target.table,
        rows = row_count,
        written,
        collisions = collisions.len(),
        "import finished"
    );

    Ok(ImportReport {
        rows: row_count,
        written,
        collisions,
    })
}
