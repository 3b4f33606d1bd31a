//! Spell import from CSV.
//!
//! Columns: `name, klass, charges, source, description`, plus an optional
//! `slug`. `klass` and `source` hold display names and are resolved through
//! the klass and source key indexes.

use std::io;

use serde::Deserialize;

use super::{ImportError, ImportOptions, ImportReport, ImportRow, ReferenceIndex, UpsertTarget};
use crate::gather::{KEY_COLUMN, Scalar};
use crate::resources::{klass, source, spell};
use crate::slug::{is_canonical, slugify};
use crate::store::Store;

pub const TARGET: UpsertTarget = UpsertTarget {
    table: spell::TABLE,
    key_column: KEY_COLUMN,
    columns: &[
        "name",
        "slug",
        "charges",
        "description",
        "klass_id",
        "source_id",
    ],
    update_columns: &["name", "description", "klass_id", "source_id"],
};

/// One CSV record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpellRecord {
    pub name: String,
    pub klass: String,
    #[serde(default)]
    pub charges: Option<i64>,
    pub source: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Parse CSV records. Surrounding whitespace is trimmed from every field.
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<SpellRecord>, ImportError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let records = csv.deserialize().collect::<Result<Vec<SpellRecord>, _>>()?;
    Ok(records)
}

/// Project records into rows, deriving missing keys and resolving references.
/// The first unresolved reference aborts the whole batch.
pub fn prepare(
    records: &[SpellRecord],
    klasses: &ReferenceIndex,
    sources: &ReferenceIndex,
) -> Result<Vec<ImportRow>, ImportError> {
    let mut rows = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        // Line 1 is the header.
        let row = i + 2;

        let key = match record.slug.as_deref() {
            Some(slug) if !slug.is_empty() => {
                if !is_canonical(slug) {
                    return Err(ImportError::InvalidKey {
                        row,
                        key: slug.to_string(),
                    });
                }
                slug.to_string()
            }
            _ => slugify(&record.name),
        };
        if key.is_empty() {
            return Err(ImportError::EmptyKey {
                row,
                name: record.name.clone(),
            });
        }

        let klass_id = klasses.resolve(row, &record.klass)?;
        let source_id = sources.resolve(row, &record.source)?;

        rows.push(ImportRow {
            cells: vec![
                Some(Scalar::Text(record.name.clone())),
                Some(Scalar::Text(key.clone())),
                record.charges.map(Scalar::Integer),
                record
                    .description
                    .as_ref()
                    .filter(|d| !d.is_empty())
                    .map(|d| Scalar::Text(d.clone())),
                Some(Scalar::Integer(klass_id)),
                Some(Scalar::Integer(source_id)),
            ],
            key,
        });
    }

    Ok(rows)
}

/// Import a batch of spell records in one transaction. Any error rolls the
/// whole batch back.
pub async fn import(
    store: &dyn Store,
    records: &[SpellRecord],
    options: ImportOptions,
) -> Result<ImportReport, ImportError> {
    let mut tx = store.begin_write().await?;

    let klasses = ReferenceIndex::load(&mut *tx, "klass", klass::TABLE).await?;
    let sources = ReferenceIndex::load(&mut *tx, "source", source::TABLE).await?;
    tracing::debug!(
        klasses = klasses.len(),
        sources = sources.len(),
        records = records.len(),
        "loaded reference indexes"
    );

    let rows = prepare(records, &klasses, &sources)?;
    let report = super::write_batch(&mut *tx, &TARGET, rows, options).await?;
    tx.commit().await?;
    Ok(report)
}
