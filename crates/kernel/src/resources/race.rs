use serde::{Deserialize, Serialize};

use super::klass::{self, Klass};
use crate::gather::Relation;

pub const TABLE: &str = "races";

pub const RACE: Relation = Relation::belongs_to("race", TABLE, "race_id");

/// The class a race's members default to.
pub const RACE_DEFAULT_KLASS: Relation =
    Relation::belongs_to("default_klass", klass::TABLE, "default_klass_id")
        .under(&RACE, "race__default_klass");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_klass_id: Option<i64>,
    #[serde(default)]
    pub default_klass: Option<Klass>,
}
