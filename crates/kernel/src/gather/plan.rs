//! Compiled query plans.
//!
//! A plan is the storage-agnostic description a [`Store`](crate::store::Store)
//! executes. The composer derives a count plan and a fetch plan from the same
//! accumulated state, so both always agree on joins and predicates.

use super::pagination::PaginationRequest;
use super::registry::{Column, Relation};
use super::types::{OrderTerm, Predicate};

/// Key of the root entity's node in a raw fetch row.
pub const ROOT_NODE: &str = "__root";

/// Key of the root's page position in a raw fetch row.
pub const POSITION: &str = "position";

/// How a relation joined for filtering or sorting treats missing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JoinKind {
    /// Roots without a match survive with nulls. Used for sort-only joins.
    Left,
    /// Roots without a match are dropped.
    Inner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub relation: &'static Relation,
    pub kind: JoinKind,
}

/// A coordinated query over one root table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table: &'static str,
    pub identity: Column,
    /// Deduplicated by alias; parents precede children.
    pub joins: Vec<Join>,
    /// AND-combined.
    pub predicates: Vec<Predicate>,
    /// Empty on count plans. Always ends with the identity when non-empty.
    pub order: Vec<OrderTerm>,
    pub page: Option<PaginationRequest>,
    /// Relations loaded alongside each root; parents precede children.
    pub eager: Vec<&'static Relation>,
}

impl QueryPlan {
    pub fn is_count(&self) -> bool {
        self.order.is_empty() && self.page.is_none() && self.eager.is_empty()
    }

    pub fn join_for(&self, alias: &str) -> Option<&Join> {
        self.joins.iter().find(|j| j.relation.alias == alias)
    }
}
