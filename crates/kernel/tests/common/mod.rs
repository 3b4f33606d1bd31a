#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`MemoryStore`] executes the same [`QueryPlan`]s the Postgres store
//! compiles to SQL, including inner/left join semantics, SQL null handling,
//! root-level pagination and fan-out rows. Fixtures are seeded with
//! [`seeded`].

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Map, Value, json};
use tower::ServiceExt;

use grimoire_kernel::error::{AppError, AppResult};
use grimoire_kernel::gather::plan::{POSITION, ROOT_NODE};
use grimoire_kernel::gather::{
    Cardinality, Column, Comparison, ID_COLUMN, JoinKind, Link, PaginationBounds, Predicate,
    QueryPlan, Relation, Scalar, SortDirection,
};
use grimoire_kernel::routes;
use grimoire_kernel::state::AppState;
use grimoire_kernel::store::{Store, UpsertBatch, WriteTx};

pub type Row = Map<String, Value>;

type Tables = HashMap<String, Vec<Row>>;

/// Alias to row, `None` where a left join found nothing.
type Context = HashMap<&'static str, Option<Row>>;

// -------------------------------------------------------------------------
// MemoryStore
// -------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unhealthy: AtomicBool,
    upserts: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &str, row: Value) {
        let Value::Object(row) = row else {
            panic!("fixture rows must be objects");
        };
        self.tables
            .write()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, table: &str, column: &str, value: Value) -> Option<Row> {
        self.rows(table)
            .into_iter()
            .find(|r| r.get(column) == Some(&value))
    }

    /// Number of upserts that reached the store.
    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(AtomicOrdering::SeqCst)
    }

    /// Write-path events in order: `begin`, `key_index <table>`,
    /// `upsert <table>`, `commit`.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, AtomicOrdering::SeqCst);
    }

    /// Contexts surviving the plan's joins and predicates, one per joined row.
    fn matching(&self, plan: &QueryPlan) -> Vec<Context> {
        let tables = self.tables.read().unwrap();
        let mut contexts: Vec<Context> = table(&tables, plan.table)
            .iter()
            .map(|root| HashMap::from([(plan.table, Some(root.clone()))]))
            .collect();

        for join in &plan.joins {
            contexts = expand(
                &tables,
                contexts,
                plan.table,
                join.relation,
                join.kind == JoinKind::Inner,
            );
        }

        contexts.retain(|ctx| plan.predicates.iter().all(|p| evaluate(ctx, p)));
        contexts
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, plan: &QueryPlan) -> AppResult<u64> {
        let ids: HashSet<String> = self
            .matching(plan)
            .iter()
            .filter_map(|ctx| cell(ctx, &plan.identity))
            .map(Value::to_string)
            .collect();
        Ok(ids.len() as u64)
    }

    async fn fetch_rows(&self, plan: &QueryPlan) -> AppResult<Vec<Value>> {
        let mut seen = HashSet::new();
        let mut roots: Vec<Context> = self
            .matching(plan)
            .into_iter()
            .filter(|ctx| {
                cell(ctx, &plan.identity).is_some_and(|id| seen.insert(id.to_string()))
            })
            .collect();

        roots.sort_by(|a, b| {
            plan.order
                .iter()
                .map(|term| order_cells(cell(a, &term.column), cell(b, &term.column), term.direction))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let (offset, limit) = match plan.page {
            Some(page) => (page.offset as usize, page.limit as usize),
            None => (0, usize::MAX),
        };

        let tables = self.tables.read().unwrap();
        let mut out = Vec::new();
        for (i, ctx) in roots.into_iter().skip(offset).take(limit).enumerate() {
            let position = offset + i + 1;
            let root = ctx.get(plan.table).cloned().flatten().unwrap_or_default();

            let mut expanded: Vec<Context> = vec![HashMap::from([(plan.table, Some(root.clone()))])];
            for relation in &plan.eager {
                expanded = expand(&tables, expanded, plan.table, *relation, false);
            }

            let many: Vec<&Relation> = plan
                .eager
                .iter()
                .copied()
                .filter(|r| r.cardinality == Cardinality::Many)
                .collect();
            expanded.sort_by(|a, b| {
                many.iter()
                    .map(|r| {
                        let column = Column::new(r.alias, ID_COLUMN);
                        order_cells(cell(a, &column), cell(b, &column), SortDirection::Asc)
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });

            for row_ctx in expanded {
                let mut row = Map::new();
                row.insert(POSITION.to_string(), json!(position));
                row.insert(ROOT_NODE.to_string(), Value::Object(root.clone()));
                for relation in &plan.eager {
                    let node = row_ctx
                        .get(relation.alias)
                        .cloned()
                        .flatten()
                        .map_or(Value::Null, Value::Object);
                    row.insert(relation.alias.to_string(), node);
                }
                out.push(Value::Object(row));
            }
        }
        Ok(out)
    }

    async fn begin_write(&self) -> AppResult<Box<dyn WriteTx + '_>> {
        self.record("begin");
        let snapshot = self.tables.read().unwrap().clone();
        Ok(Box::new(MemoryTx {
            store: self,
            tables: snapshot,
        }))
    }

    async fn is_healthy(&self) -> bool {
        !self.unhealthy.load(AtomicOrdering::SeqCst)
    }
}

/// Works on a snapshot of the tables; commit publishes it.
pub struct MemoryTx<'a> {
    store: &'a MemoryStore,
    tables: Tables,
}

#[async_trait]
impl WriteTx for MemoryTx<'_> {
    async fn key_index(&mut self, table: &'static str) -> AppResult<Vec<(String, i64)>> {
        self.store.record(format!("key_index {table}"));
        Ok(self
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|r| Some((r.get("slug")?.as_str()?.to_string(), r.get("id")?.as_i64()?)))
            .collect())
    }

    async fn upsert(&mut self, batch: &UpsertBatch) -> AppResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let key_index = batch
            .columns
            .iter()
            .position(|c| *c == batch.key_column)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("key column not in batch")))?;

        // Postgres refuses to touch the same row twice in one statement.
        let mut keys = HashSet::new();
        for row in &batch.rows {
            if !keys.insert(scalar_json(row[key_index].as_ref()).to_string()) {
                return Err(AppError::Conflict(
                    "ON CONFLICT DO UPDATE command cannot affect row a second time".to_string(),
                ));
            }
        }

        self.store.upserts.fetch_add(1, AtomicOrdering::SeqCst);
        self.store.record(format!("upsert {}", batch.table));
        let rows = self.tables.entry(batch.table.to_string()).or_default();
        let mut next_id = rows
            .iter()
            .filter_map(|r| r.get(ID_COLUMN).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;

        for cells in &batch.rows {
            let incoming: Row = batch
                .columns
                .iter()
                .zip(cells)
                .map(|(c, v)| (c.to_string(), scalar_json(v.as_ref())))
                .collect();
            let key = incoming.get(batch.key_column).cloned();

            match rows.iter_mut().find(|r| r.get(batch.key_column) == key.as_ref()) {
                Some(existing) => {
                    for column in &batch.update_columns {
                        let value = incoming.get(*column).cloned().unwrap_or(Value::Null);
                        existing.insert(column.to_string(), value);
                    }
                }
                None => {
                    let mut row = incoming;
                    row.insert(ID_COLUMN.to_string(), json!(next_id));
                    next_id += 1;
                    rows.push(row);
                }
            }
        }
        Ok(batch.rows.len() as u64)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { store, tables } = *self;
        store.record("commit");
        *store.tables.write().unwrap() = tables;
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Plan evaluation
// -------------------------------------------------------------------------

fn table<'a>(tables: &'a Tables, name: &str) -> &'a [Row] {
    tables.get(name).map(Vec::as_slice).unwrap_or_default()
}

/// Join `relation` onto every context. Inner joins drop contexts without a
/// target; left joins keep them with a `None` node.
fn expand(
    tables: &Tables,
    contexts: Vec<Context>,
    root_alias: &'static str,
    relation: &'static Relation,
    inner: bool,
) -> Vec<Context> {
    let parent_alias = relation.parent_alias().unwrap_or(root_alias);
    let mut out = Vec::new();

    for ctx in contexts {
        let targets = ctx
            .get(parent_alias)
            .cloned()
            .flatten()
            .map(|parent| targets(tables, relation, &parent))
            .unwrap_or_default();

        if targets.is_empty() {
            if !inner {
                let mut ctx = ctx;
                ctx.insert(relation.alias, None);
                out.push(ctx);
            }
            continue;
        }
        for target in targets {
            let mut next = ctx.clone();
            next.insert(relation.alias, Some(target));
            out.push(next);
        }
    }
    out
}

fn targets(tables: &Tables, relation: &Relation, parent: &Row) -> Vec<Row> {
    match relation.link {
        Link::Column { local, foreign } => {
            let Some(value) = parent.get(local).filter(|v| !v.is_null()) else {
                return Vec::new();
            };
            table(tables, relation.table)
                .iter()
                .filter(|t| t.get(foreign) == Some(value))
                .cloned()
                .collect()
        }
        Link::Junction {
            table: junction,
            parent_column,
            target_column,
        } => {
            let Some(id) = parent.get(ID_COLUMN) else {
                return Vec::new();
            };
            table(tables, junction)
                .iter()
                .filter(|link| link.get(parent_column) == Some(id))
                .filter_map(|link| link.get(target_column))
                .flat_map(|target_id| {
                    table(tables, relation.table)
                        .iter()
                        .filter(move |t| t.get(ID_COLUMN) == Some(target_id))
                        .cloned()
                })
                .collect()
        }
    }
}

fn cell<'a>(ctx: &'a Context, column: &Column) -> Option<&'a Value> {
    ctx.get(column.alias)?
        .as_ref()?
        .get(column.name)
        .filter(|v| !v.is_null())
}

/// SQL semantics: any comparison against NULL is false.
fn evaluate(ctx: &Context, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::AnyOf(terms) => terms.iter().any(|t| evaluate(ctx, t)),
        Predicate::Compare {
            column,
            comparison,
            value,
        } => {
            let Some(cell) = cell(ctx, column) else {
                return false;
            };
            let ord = compare(cell, &scalar_json(Some(value)));
            match comparison {
                Comparison::Contains => match (cell.as_str(), value.as_str()) {
                    (Some(haystack), Some(needle)) => haystack.contains(needle),
                    _ => false,
                },
                Comparison::Eq => ord == Some(Ordering::Equal),
                Comparison::Ne => ord.is_some_and(|o| o != Ordering::Equal),
                Comparison::Lt => ord == Some(Ordering::Less),
                Comparison::Lte => ord.is_some_and(|o| o != Ordering::Greater),
                Comparison::Gt => ord == Some(Ordering::Greater),
                Comparison::Gte => ord.is_some_and(|o| o != Ordering::Less),
            }
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Postgres default null placement: last ascending, first descending.
fn order_cells(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => match direction {
            SortDirection::Asc => Ordering::Greater,
            SortDirection::Desc => Ordering::Less,
        },
        (Some(_), None) => match direction {
            SortDirection::Asc => Ordering::Less,
            SortDirection::Desc => Ordering::Greater,
        },
        (Some(x), Some(y)) => {
            let ord = compare(x, y).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

fn scalar_json(value: Option<&Scalar>) -> Value {
    match value {
        None => Value::Null,
        Some(Scalar::Integer(i)) => json!(i),
        Some(Scalar::Float(f)) => json!(f),
        Some(Scalar::Text(s)) => json!(s),
    }
}

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

const STAMP: &str = "2024-01-01T00:00:00Z";

/// A store holding the reference fixture set.
///
/// Creature 9 references a missing trait and is excluded from every creature
/// query. Creature 7 (`red-dragon`) has three sources.
pub fn seeded() -> MemoryStore {
    let store = MemoryStore::new();

    for (id, name, slug) in [
        (1, "Mage", "mage"),
        (2, "Cleric", "cleric"),
        (3, "Warrior", "warrior"),
        (4, "Ranger", "ranger"),
    ] {
        store.insert(
            "klasses",
            json!({"id": id, "name": name, "slug": slug, "description": null}),
        );
    }

    for (id, name, slug) in [
        (1, "Core Rulebook", "core-rulebook"),
        (2, "Monster Manual", "monster-manual"),
        (3, "Bestiary", "bestiary"),
    ] {
        store.insert(
            "sources",
            json!({
                "id": id, "name": name, "slug": slug, "description": null,
                "created_at": STAMP, "updated_at": STAMP
            }),
        );
    }

    store.insert(
        "races",
        json!({"id": 1, "name": "Dragon", "slug": "dragon", "description": null, "default_klass_id": 3}),
    );
    store.insert(
        "races",
        json!({"id": 2, "name": "Elf", "slug": "elf", "description": null, "default_klass_id": 4}),
    );
    store.insert(
        "races",
        json!({"id": 3, "name": "Goblin", "slug": "goblin", "description": null, "default_klass_id": null}),
    );

    store.insert("materials", json!({"id": 1, "name": "Iron", "slug": "iron"}));

    for (id, name, slug, tags, material) in [
        (1, "Fiery", "fiery", "fire,aura", Some(1)),
        (2, "Sneaky", "sneaky", "stealth", None),
        (3, "Hardy", "hardy", "stone", None),
    ] {
        store.insert(
            "traits",
            json!({
                "id": id, "name": name, "slug": slug, "description": null,
                "tags": tags, "material_id": material
            }),
        );
    }

    // (id, name, slug, health, attack, intelligence, defense, speed, klass, race, trait)
    for (id, name, slug, hp, atk, int, def, spd, klass, race, tr) in [
        (1, "Goblin Scout", "goblin-scout", 20, 5, 4, 3, 12, 4, 3, 2),
        (2, "Elf Archer", "elf-archer", 30, 8, 10, 4, 14, 4, 2, 2),
        (3, "Goblin Shaman", "goblin-shaman", 18, 3, 12, 2, 10, 1, 3, 1),
        (4, "Stone Golem", "stone-golem", 120, 15, 2, 20, 4, 3, 3, 3),
        (5, "Elf Mage", "elf-mage", 25, 4, 18, 3, 12, 1, 2, 1),
        (6, "Cave Troll", "cave-troll", 90, 14, 3, 12, 6, 3, 3, 3),
        (7, "Red Dragon", "red-dragon", 300, 40, 16, 30, 10, 3, 1, 1),
        (8, "Wyrmling", "wyrmling", 80, 12, 8, 10, 10, 3, 1, 1),
        (9, "Lost Wisp", "lost-wisp", 5, 1, 1, 1, 20, 1, 2, 99),
        (10, "Elf Cleric", "elf-cleric", 28, 4, 14, 4, 12, 2, 2, 2),
    ] {
        store.insert(
            "creatures",
            json!({
                "id": id, "name": name, "slug": slug, "description": null,
                "health": hp, "attack": atk, "intelligence": int, "defense": def,
                "speed": spd, "klass_id": klass, "race_id": race, "trait_id": tr
            }),
        );
    }

    for (creature, source) in [(7, 1), (7, 2), (7, 3), (1, 2), (2, 1), (2, 3), (8, 2)] {
        store.insert(
            "creature_sources",
            json!({"creature_id": creature, "source_id": source}),
        );
    }

    for (id, name, slug, charges, klass, source) in [
        (1, "Magic Missile", "magic-missile", Some(5), 1, 1),
        (2, "Heal", "heal", None, 2, 1),
        (3, "Light", "light", Some(3), 2, 2),
        (4, "Frost Bolt", "frost-bolt", Some(2), 1, 2),
        (5, "Smite", "smite", None, 2, 1),
    ] {
        store.insert(
            "spells",
            json!({
                "id": id, "name": name, "slug": slug, "charges": charges,
                "description": null, "klass_id": klass, "source_id": source
            }),
        );
    }

    for (id, name, slug, category, turns, leave, stacks) in [
        (1, "Burning", "burning", Some("debuff"), Some(3), Some(20), 3),
        (2, "Blessed", "blessed", Some("buff"), Some(5), None, 1),
        (3, "Stunned", "stunned", Some("debuff"), Some(1), None, 1),
        (4, "Wet", "wet", None, None, Some(50), 1),
    ] {
        store.insert(
            "status_effects",
            json!({
                "id": id, "name": name, "slug": slug, "description": null,
                "category": category, "icon": format!("{slug}.png"),
                "turns": turns, "leave_chance": leave, "max_stacks": stacks
            }),
        );
    }

    store
}

pub fn app_state(store: Arc<MemoryStore>) -> AppState {
    AppState::from_parts(store, PaginationBounds::default()).unwrap()
}

pub fn app(store: Arc<MemoryStore>) -> Router {
    routes::router().with_state(app_state(store))
}

// -------------------------------------------------------------------------
// HTTP helpers
// -------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}
