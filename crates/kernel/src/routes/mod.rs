//! HTTP route handlers.

pub mod health;
pub mod resource;

use axum::Router;

use crate::resources::{Creatures, Spells, StatusEffects, Traits};
use crate::state::AppState;

/// All routes, without middleware layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(resource::router::<Creatures>())
        .merge(resource::router::<Spells>())
        .merge(resource::router::<Traits>())
        .merge(resource::router::<StatusEffects>())
}
