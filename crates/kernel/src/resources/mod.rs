//! Resource declarations.
//!
//! Each resource names its table, its field registry, the relations every
//! query joins and the relations loaded alongside each entity. Routers are
//! generic over [`Resource`], so all resources behave identically.

pub mod creature;
pub mod klass;
pub mod race;
pub mod source;
pub mod spell;
pub mod status_effect;
pub mod trait_;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::gather::{FieldRegistry, QueryComposer, Relation, RegistryError};

pub use creature::Creatures;
pub use spell::Spells;
pub use status_effect::StatusEffects;
pub use trait_::Traits;

pub trait Resource: Send + Sync + 'static {
    type Model: DeserializeOwned + Serialize + Send + 'static;

    /// URL path segment.
    const PATH: &'static str;

    /// Relations inner-joined on every query, for count and fetch alike.
    const JOINS: &'static [&'static Relation] = &[];

    /// Relations loaded alongside each entity.
    const EAGER: &'static [&'static Relation] = &[];

    fn registry(registries: &Registries) -> &FieldRegistry;

    /// A composer with this resource's joins and prefetches applied.
    fn composer(registries: &Registries) -> QueryComposer<'_> {
        QueryComposer::new(Self::registry(registries))
            .joins(Self::JOINS)
            .prefetch(Self::EAGER)
    }
}

/// Field registries of every resource, built once at startup.
#[derive(Debug, Clone)]
pub struct Registries {
    pub creatures: FieldRegistry,
    pub spells: FieldRegistry,
    pub traits: FieldRegistry,
    pub status_effects: FieldRegistry,
}

impl Registries {
    pub fn build() -> Result<Self, RegistryError> {
        Ok(Self {
            creatures: creature::registry()?,
            spells: spell::registry()?,
            traits: trait_::registry()?,
            status_effects: status_effect::registry()?,
        })
    }
}
