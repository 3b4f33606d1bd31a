//! Creatures.
//!
//! Every creature query inner-joins its race, class and trait, so a creature
//! missing any of them is not listed. Sources are many-to-many through
//! `creature_sources`.

use serde::{Deserialize, Serialize};

use super::klass::{KLASS, Klass};
use super::race::{RACE, RACE_DEFAULT_KLASS, Race};
use super::source::{self, Source};
use super::trait_::{TRAIT, Trait};
use super::{Registries, Resource};
use crate::gather::{FieldDescriptor, FieldRegistry, Relation, RegistryError};

pub const TABLE: &str = "creatures";

pub const CREATURE_SOURCES: Relation = Relation::many_through(
    "sources",
    source::TABLE,
    "creature_sources",
    "creature_id",
    "source_id",
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub health: i32,
    pub attack: i32,
    pub intelligence: i32,
    pub defense: i32,
    pub speed: i32,
    pub klass_id: i64,
    pub race_id: i64,
    pub trait_id: i64,
    #[serde(default)]
    pub klass: Option<Klass>,
    #[serde(default)]
    pub race: Option<Race>,
    #[serde(default, rename = "trait")]
    pub creature_trait: Option<Trait>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

pub fn registry() -> Result<FieldRegistry, RegistryError> {
    FieldRegistry::register(
        TABLE,
        vec![
            FieldDescriptor::identity("id"),
            FieldDescriptor::text("name"),
            FieldDescriptor::numeric("health"),
            FieldDescriptor::numeric("attack"),
            FieldDescriptor::numeric("intelligence"),
            FieldDescriptor::numeric("defense"),
            FieldDescriptor::numeric("speed"),
            FieldDescriptor::reference("klass_id"),
            FieldDescriptor::text("klass_name").via(&KLASS, "name"),
            FieldDescriptor::reference("race_id"),
            FieldDescriptor::text("race_name").via(&RACE, "name"),
            FieldDescriptor::reference("trait_id"),
            FieldDescriptor::text("trait_name").via(&TRAIT, "name"),
            FieldDescriptor::text("trait_tags").via(&TRAIT, "tags"),
        ],
    )
}

pub struct Creatures;

impl Resource for Creatures {
    type Model = Creature;

    const PATH: &'static str = "creatures";
    const JOINS: &'static [&'static Relation] = &[&RACE, &KLASS, &TRAIT];
    const EAGER: &'static [&'static Relation] =
        &[&KLASS, &RACE, &TRAIT, &RACE_DEFAULT_KLASS, &CREATURE_SOURCES];

    fn registry(registries: &Registries) -> &FieldRegistry {
        &registries.creatures
    }
}
