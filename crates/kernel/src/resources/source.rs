//! Publications that game content comes from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gather::Relation;

pub const TABLE: &str = "sources";

/// `source_id` on the parent row.
pub const SOURCE: Relation = Relation::belongs_to("source", TABLE, "source_id");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
