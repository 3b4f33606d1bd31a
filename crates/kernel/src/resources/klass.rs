//! Character classes. Referenced by spells, creatures and races.

use serde::{Deserialize, Serialize};

use crate::gather::Relation;

pub const TABLE: &str = "klasses";

/// `klass_id` on the parent row.
pub const KLASS: Relation = Relation::belongs_to("klass", TABLE, "klass_id");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Klass {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}
