//! Status effects.

use serde::{Deserialize, Serialize};

use super::{Registries, Resource};
use crate::gather::{FieldDescriptor, FieldRegistry, RegistryError};

pub const TABLE: &str = "status_effects";

/// Labels of the `status_effect_category` enum.
pub const CATEGORIES: &[&str] = &["buff", "debuff", "neutral"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Buff,
    Debuff,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    pub icon: String,
    #[serde(default)]
    pub turns: Option<i32>,
    #[serde(default)]
    pub leave_chance: Option<i32>,
    pub max_stacks: i32,
}

pub fn registry() -> Result<FieldRegistry, RegistryError> {
    FieldRegistry::register(
        TABLE,
        vec![
            FieldDescriptor::identity("id"),
            FieldDescriptor::text("name"),
            FieldDescriptor::enumeration("category", CATEGORIES),
            FieldDescriptor::numeric("turns"),
            FieldDescriptor::numeric("leave_chance"),
            FieldDescriptor::numeric("max_stacks"),
        ],
    )
}

pub struct StatusEffects;

impl Resource for StatusEffects {
    type Model = StatusEffect;

    const PATH: &'static str = "status-effects";

    fn registry(registries: &Registries) -> &FieldRegistry {
        &registries.status_effects
    }
}
