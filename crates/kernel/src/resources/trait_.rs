//! Creature traits.

use serde::{Deserialize, Serialize};

use super::{Registries, Resource};
use crate::gather::{FieldDescriptor, FieldRegistry, Relation, RegistryError};

pub const TABLE: &str = "traits";

pub const TRAIT: Relation = Relation::belongs_to("trait", TABLE, "trait_id");

pub const MATERIAL: Relation = Relation::belongs_to("material", "materials", "material_id");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trait {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Comma-separated.
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub material_id: Option<i64>,
    #[serde(default)]
    pub material: Option<Material>,
}

pub fn registry() -> Result<FieldRegistry, RegistryError> {
    FieldRegistry::register(
        TABLE,
        vec![
            FieldDescriptor::identity("id"),
            FieldDescriptor::text("name"),
            FieldDescriptor::text("material_name").via(&MATERIAL, "name"),
        ],
    )
}

pub struct Traits;

impl Resource for Traits {
    type Model = Trait;

    const PATH: &'static str = "traits";
    const EAGER: &'static [&'static Relation] = &[&MATERIAL];

    fn registry(registries: &Registries) -> &FieldRegistry {
        &registries.traits
    }
}
