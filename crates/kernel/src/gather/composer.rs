//! Query composer.
//!
//! A request-scoped builder that accumulates joins, predicates, sort,
//! pagination and prefetch directives, then derives a count plan and a fetch
//! plan from that single state.

use serde::de::DeserializeOwned;

use super::assemble::assemble;
use super::filter::FilterRequest;
use super::pagination::PaginationRequest;
use super::plan::{Join, JoinKind, QueryPlan};
use super::registry::{FieldRegistry, Relation};
use super::sort::SortRequest;
use super::types::Predicate;
use crate::error::{AppError, AppResult};
use crate::store::Store;

/// Page used by [`QueryComposer::get_one`]: two rows reveal a broken
/// uniqueness guarantee.
const GET_ONE_PAGE: PaginationRequest = PaginationRequest {
    offset: 0,
    limit: 2,
};

#[derive(Debug, Clone)]
pub struct QueryComposer<'r> {
    registry: &'r FieldRegistry,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    sort: Option<SortRequest>,
    page: Option<PaginationRequest>,
    eager: Vec<&'static Relation>,
    lookup: Option<String>,
}

impl<'r> QueryComposer<'r> {
    pub fn new(registry: &'r FieldRegistry) -> Self {
        Self {
            registry,
            joins: Vec::new(),
            predicates: Vec::new(),
            sort: None,
            page: None,
            eager: Vec::new(),
            lookup: None,
        }
    }

    /// Inner-join a relation and its parents. Joining twice is a no-op.
    pub fn join(mut self, relation: &'static Relation) -> Self {
        require(&mut self.joins, relation, JoinKind::Inner);
        self
    }

    pub fn joins(self, relations: &[&'static Relation]) -> Self {
        relations.iter().fold(self, |composer, r| composer.join(*r))
    }

    /// AND the request's clauses into the predicate list.
    pub fn filter(mut self, filter: &FilterRequest) -> Self {
        for name in filter.fields() {
            if let Some(relation) = self.registry.get(name).and_then(|f| f.relation) {
                require(&mut self.joins, relation, JoinKind::Inner);
            }
        }
        self.predicates.extend(filter.predicates(self.registry));
        self
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn where_by_identity_or_key(mut self, value: &str) -> Self {
        let predicate = self.registry.identity_or_key(value);
        self.lookup = Some(value.to_string());
        self.and_where(predicate)
    }

    pub fn order_by(mut self, sort: &SortRequest) -> Self {
        self.sort = Some(sort.clone());
        self
    }

    pub fn paginate(mut self, page: PaginationRequest) -> Self {
        self.page = Some(page);
        self
    }

    /// Load relations alongside each root. Nested relations bring their
    /// parents along.
    pub fn prefetch(mut self, relations: &[&'static Relation]) -> Self {
        for relation in relations {
            for link in relation.lineage() {
                if !self.eager.iter().any(|r| r.alias == link.alias) {
                    self.eager.push(link);
                }
            }
        }
        self
    }

    fn effective_sort(&self) -> SortRequest {
        self.sort
            .clone()
            .unwrap_or_else(|| SortRequest::default_for(self.registry))
    }

    /// State shared by both plans. Relations reached only by the sort are
    /// left-joined so they never change which roots match.
    fn base_plan(&self) -> QueryPlan {
        let mut joins = self.joins.clone();
        for entry in self.effective_sort().entries() {
            if let Some(relation) = self.registry.get(entry.field).and_then(|f| f.relation) {
                require(&mut joins, relation, JoinKind::Left);
            }
        }

        QueryPlan {
            table: self.registry.table(),
            identity: self.registry.identity_column(),
            joins,
            predicates: self.predicates.clone(),
            order: Vec::new(),
            page: None,
            eager: Vec::new(),
        }
    }

    pub fn count_plan(&self) -> QueryPlan {
        self.base_plan()
    }

    pub fn fetch_plan(&self) -> QueryPlan {
        QueryPlan {
            order: self.effective_sort().order_terms(self.registry),
            page: self.page,
            eager: self.eager.clone(),
            ..self.base_plan()
        }
    }

    /// Number of distinct roots matching the predicates.
    pub async fn count(&self, store: &dyn Store) -> AppResult<u64> {
        store.count(&self.count_plan()).await
    }

    /// Roots for the current page, regrouped and decoded.
    pub async fn fetch<T: DeserializeOwned>(&self, store: &dyn Store) -> AppResult<Vec<T>> {
        let plan = self.fetch_plan();
        let rows = store.fetch_rows(&plan).await?;
        decode(rows, &plan)
    }

    /// Total and page together.
    pub async fn page<T: DeserializeOwned>(&self, store: &dyn Store) -> AppResult<(u64, Vec<T>)> {
        let count = self.count_plan();
        let fetch = self.fetch_plan();
        let (total, rows) = store.count_and_fetch(&count, &fetch).await?;
        Ok((total, decode(rows, &fetch)?))
    }

    /// The single root matching the predicates.
    pub async fn get_one<T: DeserializeOwned>(self, store: &dyn Store) -> AppResult<T> {
        let resource = self.registry.table();
        let key = self.lookup.clone().unwrap_or_default();
        let mut found: Vec<T> = self.paginate(GET_ONE_PAGE).fetch(store).await?;

        match found.len() {
            0 => Err(AppError::NotFound { resource, key }),
            1 => Ok(found.remove(0)),
            n => Err(AppError::Invariant(format!(
                "{n} {resource} rows match unique key '{key}'"
            ))),
        }
    }
}

/// Add a relation and its parents, upgrading an existing left join to inner
/// when asked.
fn require(joins: &mut Vec<Join>, relation: &'static Relation, kind: JoinKind) {
    for link in relation.lineage() {
        match joins.iter_mut().find(|j| j.relation.alias == link.alias) {
            Some(existing) => existing.kind = existing.kind.max(kind),
            None => joins.push(Join {
                relation: link,
                kind,
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(rows: Vec<serde_json::Value>, plan: &QueryPlan) -> AppResult<Vec<T>> {
    let rows_len = rows.len();
    let entities = assemble(rows, &plan.eager)?;
    tracing::debug!(
        table = plan.table,
        rows = rows_len,
        entities = entities.len(),
        "assembled fetch rows"
    );
    entities
        .into_iter()
        .map(|entity| {
            serde_json::from_value(entity).map_err(|e| {
                AppError::Internal(anyhow::Error::new(e).context(format!(
                    "failed to decode {} row",
                    plan.table
                )))
            })
        })
        .collect()
}
