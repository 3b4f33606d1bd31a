//! Gather: generic query composition.
//!
//! This module provides:
//! - FieldRegistry: per-resource sortable/filterable field declarations
//! - SortRequest, FilterRequest, PaginationRequest: validated request specs
//! - QueryComposer: builds coordinated count and fetch plans
//! - query_builder: SeaQuery-based SQL generation for plans
//! - assemble: fan-out regrouping of fetched rows

mod assemble;
mod composer;
mod filter;
mod pagination;
pub mod plan;
pub mod query_builder;
mod registry;
mod sort;
pub mod types;

pub use assemble::assemble;
pub use composer::QueryComposer;
pub use filter::{FilterClause, FilterRequest};
pub use pagination::{
    DEFAULT_LIMIT, MAX_LIMIT, PaginationBounds, PaginationRequest, PaginationResponse,
};
pub use plan::{Join, JoinKind, QueryPlan};
pub use registry::{
    Cardinality, Column, FieldDescriptor, FieldKind, FieldRegistry, ID_COLUMN, KEY_COLUMN, Link,
    Relation, RegistryError,
};
pub use sort::{SortEntry, SortRequest};
pub use types::{
    Comparison, FilterOperator, FilterValue, OrderTerm, Predicate, RawFilter, RawFilterClause,
    RawPagination, RawSortEntry, Scalar, SortDirection,
};
