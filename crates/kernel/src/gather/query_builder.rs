//! SQL compilation for query plans using SeaQuery.
//!
//! The count plan compiles to a `COUNT(DISTINCT root.id)` over the shared
//! joins and predicates. The fetch plan compiles to two levels:
//! - a `page` subquery that picks the root identities for the requested page
//!   and numbers them with `ROW_NUMBER()` in sort order;
//! - an outer query that joins the page back to the root and left-joins every
//!   eager relation, returning each table as a JSON node.
//!
//! Pagination is therefore applied to roots before eager joins fan out.

use sea_query::{
    Alias, Cond, Expr, JoinType, Order, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
    Value,
};

use super::plan::{JoinKind, POSITION, QueryPlan, ROOT_NODE};
use super::registry::{Cardinality, Column, ID_COLUMN, Link, Relation};
use super::types::{Comparison, OrderTerm, Predicate, Scalar, SortDirection};

const PAGE_ALIAS: &str = "page";
const ROOT_ID: &str = "root_id";

/// Build the COUNT query for a plan.
pub fn build_count(plan: &QueryPlan) -> String {
    let mut query = Query::select();
    query.expr(Expr::cust(format!(
        "COUNT(DISTINCT {})",
        quote_column(&plan.identity)
    )));
    query.from(Alias::new(plan.table));
    add_joins(&mut query, plan, None);
    add_predicates(&mut query, plan);
    query.to_string(PostgresQueryBuilder)
}

/// Build the fetch query for a plan. Each result row carries the root's page
/// position, the root node and one node per eager relation.
pub fn build_fetch(plan: &QueryPlan) -> String {
    let mut query = Query::select();
    query.column((Alias::new(PAGE_ALIAS), Alias::new(POSITION)));
    query.expr_as(
        Expr::cust(format!("row_to_json({})", quote(plan.table))),
        Alias::new(ROOT_NODE),
    );
    for relation in &plan.eager {
        query.expr_as(
            Expr::cust(format!("row_to_json({})", quote(relation.alias))),
            Alias::new(relation.alias),
        );
    }

    query.from_subquery(build_page(plan), Alias::new(PAGE_ALIAS));
    query.join(
        JoinType::InnerJoin,
        Alias::new(plan.table),
        Expr::col((Alias::new(plan.table), Alias::new(ID_COLUMN)))
            .equals((Alias::new(PAGE_ALIAS), Alias::new(ROOT_ID))),
    );
    for relation in &plan.eager {
        add_relation(&mut query, plan.table, relation, JoinType::LeftJoin);
    }

    query.order_by((Alias::new(PAGE_ALIAS), Alias::new(POSITION)), Order::Asc);
    for relation in plan.eager.iter().filter(|r| r.cardinality == Cardinality::Many) {
        query.order_by((Alias::new(relation.alias), Alias::new(ID_COLUMN)), Order::Asc);
    }

    query.to_string(PostgresQueryBuilder)
}

/// Root identities for one page, numbered in sort order.
///
/// When a join fans out the root, membership is decided by a semi-join so
/// each root is numbered once.
fn build_page(plan: &QueryPlan) -> SelectStatement {
    let identity = &plan.identity;
    let fans_out = plan.joins.iter().any(|j| j.relation.fans_out());

    let mut page = Query::select();
    page.expr_as(column_expr(identity), Alias::new(ROOT_ID));
    page.expr_as(
        Expr::cust(format!("ROW_NUMBER() OVER (ORDER BY {})", order_clause(&plan.order))),
        Alias::new(POSITION),
    );
    page.from(Alias::new(plan.table));

    if fans_out {
        add_joins(&mut page, plan, Some(false));

        let mut matching = Query::select();
        matching.column((Alias::new(identity.alias), Alias::new(identity.name)));
        matching.from(Alias::new(plan.table));
        add_joins(&mut matching, plan, None);
        add_predicates(&mut matching, plan);

        page.and_where(column_expr(identity).in_subquery(matching));
    } else {
        add_joins(&mut page, plan, None);
        add_predicates(&mut page, plan);
    }

    for term in &plan.order {
        page.order_by(
            (Alias::new(term.column.alias), Alias::new(term.column.name)),
            order(term.direction),
        );
    }
    if let Some(request) = plan.page {
        page.limit(request.limit);
        page.offset(request.offset);
    }
    page
}

/// Add the plan's joins. `fanning` restricts them to relations that do or do
/// not fan out the root.
fn add_joins(query: &mut SelectStatement, plan: &QueryPlan, fanning: Option<bool>) {
    for join in &plan.joins {
        if fanning.is_some_and(|f| f != join.relation.fans_out()) {
            continue;
        }
        let join_type = match join.kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
        };
        add_relation(query, plan.table, join.relation, join_type);
    }
}

fn add_relation(
    query: &mut SelectStatement,
    root: &'static str,
    relation: &Relation,
    join_type: JoinType,
) {
    let parent = relation.parent_alias().unwrap_or(root);
    match relation.link {
        Link::Column { local, foreign } => {
            query.join_as(
                join_type,
                Alias::new(relation.table),
                Alias::new(relation.alias),
                Expr::col((Alias::new(parent), Alias::new(local)))
                    .equals((Alias::new(relation.alias), Alias::new(foreign))),
            );
        }
        Link::Junction {
            table,
            parent_column,
            target_column,
        } => {
            let link = junction_alias(relation);
            query.join_as(
                join_type,
                Alias::new(table),
                Alias::new(&link),
                Expr::col((Alias::new(parent), Alias::new(ID_COLUMN)))
                    .equals((Alias::new(&link), Alias::new(parent_column))),
            );
            query.join_as(
                join_type,
                Alias::new(relation.table),
                Alias::new(relation.alias),
                Expr::col((Alias::new(&link), Alias::new(target_column)))
                    .equals((Alias::new(relation.alias), Alias::new(ID_COLUMN))),
            );
        }
    }
}

fn junction_alias(relation: &Relation) -> String {
    format!("{}__link", relation.alias)
}

fn add_predicates(query: &mut SelectStatement, plan: &QueryPlan) {
    for predicate in &plan.predicates {
        query.and_where(predicate_expr(predicate));
    }
}

fn predicate_expr(predicate: &Predicate) -> SimpleExpr {
    match predicate {
        Predicate::Compare {
            column,
            comparison,
            value,
        } => {
            let col = Expr::col((Alias::new(column.alias), Alias::new(column.name)));
            match comparison {
                Comparison::Eq => col.eq(scalar_value(value)),
                Comparison::Ne => col.ne(scalar_value(value)),
                Comparison::Lt => col.lt(scalar_value(value)),
                Comparison::Lte => col.lte(scalar_value(value)),
                Comparison::Gt => col.gt(scalar_value(value)),
                Comparison::Gte => col.gte(scalar_value(value)),
                Comparison::Contains => {
                    let needle = value.as_str().unwrap_or_default();
                    col.like(format!("%{}%", escape_like_wildcards(needle)))
                }
            }
        }
        Predicate::AnyOf(terms) => terms
            .iter()
            .fold(Cond::any(), |cond, term| cond.add(predicate_expr(term)))
            .into(),
    }
}

pub(crate) fn scalar_value(value: &Scalar) -> Value {
    match value {
        Scalar::Integer(i) => Value::from(*i),
        Scalar::Float(f) => Value::from(*f),
        Scalar::Text(s) => Value::from(s.clone()),
    }
}

fn column_expr(column: &Column) -> Expr {
    Expr::col((Alias::new(column.alias), Alias::new(column.name)))
}

fn order(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

fn order_clause(terms: &[OrderTerm]) -> String {
    terms
        .iter()
        .map(|term| {
            let direction = match term.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {direction}", quote_column(&term.column))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_column(column: &Column) -> String {
    format!("{}.{}", quote(column.alias), quote(column.name))
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
