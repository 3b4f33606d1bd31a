//! Grimoire Kernel Library
//!
//! Game reference API: generic query composition over PostgreSQL, the
//! resource routers built on it, and the spell importer. The `grimoire`
//! binary is the entry point for serving and importing.

pub mod config;
pub mod db;
pub mod error;
pub mod gather;
pub mod importer;
pub mod resources;
pub mod routes;
pub mod slug;
pub mod state;
pub mod store;
