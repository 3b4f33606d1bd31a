//! Spells.

use serde::{Deserialize, Serialize};

use super::klass::{KLASS, Klass};
use super::source::{SOURCE, Source};
use super::{Registries, Resource};
use crate::gather::{FieldDescriptor, FieldRegistry, Relation, RegistryError};

pub const TABLE: &str = "spells";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub charges: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    pub klass_id: i64,
    pub source_id: i64,
    #[serde(default)]
    pub klass: Option<Klass>,
    #[serde(default)]
    pub source: Option<Source>,
}

pub fn registry() -> Result<FieldRegistry, RegistryError> {
    FieldRegistry::register(
        TABLE,
        vec![
            FieldDescriptor::identity("id"),
            FieldDescriptor::text("name"),
            FieldDescriptor::numeric("charges"),
            FieldDescriptor::reference("klass_id"),
            FieldDescriptor::text("klass_name").via(&KLASS, "name"),
            FieldDescriptor::reference("source_id"),
            FieldDescriptor::text("source_name").via(&SOURCE, "name"),
        ],
    )
}

pub struct Spells;

impl Resource for Spells {
    type Model = Spell;

    const PATH: &'static str = "spells";
    const EAGER: &'static [&'static Relation] = &[&KLASS, &SOURCE];

    fn registry(registries: &Registries) -> &FieldRegistry {
        &registries.spells
    }
}
