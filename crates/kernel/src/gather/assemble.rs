//! Fan-out regrouping.
//!
//! A fetch returns one raw row per combination of a root and its eager-loaded
//! relations, so a root with three sources arrives three times. [`assemble`]
//! folds those rows back into one object per root, in page order, with each
//! related collection materialised once and ordered by identity.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use super::plan::{POSITION, ROOT_NODE};
use super::registry::{Cardinality, ID_COLUMN, Relation};
use crate::error::{AppError, AppResult};

struct Node {
    parent: String,
    id: String,
    object: Map<String, Value>,
}

struct Group {
    id: String,
    root: Map<String, Value>,
    nodes: HashMap<&'static str, Vec<Node>>,
    seen: HashSet<(&'static str, String, String)>,
}

impl Group {
    fn new(id: String, root: Map<String, Value>) -> Self {
        Self {
            id,
            root,
            nodes: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, alias: &'static str, parent: String, id: String, object: Map<String, Value>) {
        if self.seen.insert((alias, parent.clone(), id.clone())) {
            self.nodes
                .entry(alias)
                .or_default()
                .push(Node { parent, id, object });
        }
    }

    fn build(self, eager: &[&'static Relation]) -> Value {
        let mut root = self.root;
        attach(&mut root, None, &self.id, eager, &self.nodes);
        Value::Object(root)
    }
}

fn attach(
    target: &mut Map<String, Value>,
    parent_alias: Option<&str>,
    parent_id: &str,
    eager: &[&'static Relation],
    nodes: &HashMap<&'static str, Vec<Node>>,
) {
    for relation in eager.iter().filter(|r| r.parent_alias() == parent_alias) {
        let mut members: Vec<&Node> = nodes
            .get(relation.alias)
            .into_iter()
            .flatten()
            .filter(|node| node.parent == parent_id)
            .collect();
        if matches!(relation.cardinality, Cardinality::Many) {
            members.sort_by(|a, b| compare_ids(&a.object, &b.object));
        }

        let children: Vec<Value> = members
            .into_iter()
            .map(|node| {
                let mut object = node.object.clone();
                attach(&mut object, Some(relation.alias), &node.id, eager, nodes);
                Value::Object(object)
            })
            .collect();

        let value = match relation.cardinality {
            Cardinality::One => children.into_iter().next().unwrap_or(Value::Null),
            Cardinality::Many => Value::Array(children),
        };
        target.insert(relation.name.to_string(), value);
    }
}

/// Numeric identities compare as numbers, anything else by its JSON text.
fn compare_ids(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    let (a, b) = (a.get(ID_COLUMN), b.get(ID_COLUMN));
    match (a.and_then(Value::as_i64), b.and_then(Value::as_i64)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.map(Value::to_string).cmp(&b.map(Value::to_string)),
    }
}

fn take_object(nodes: &mut Map<String, Value>, key: &str) -> AppResult<Option<Map<String, Value>>> {
    match nodes.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err(AppError::Invariant(format!(
            "fetch row node '{key}' is not an object"
        ))),
    }
}

fn node_id(object: &Map<String, Value>) -> Option<String> {
    match object.get(ID_COLUMN) {
        None | Some(Value::Null) => None,
        Some(id) => Some(id.to_string()),
    }
}

/// Regroup raw fetch rows by root identity.
///
/// Rows are ordered by their `position`; rows sharing a root keep their
/// relative order. A missing or null relation node leaves that relation empty
/// for the row.
pub fn assemble(rows: Vec<Value>, eager: &[&'static Relation]) -> AppResult<Vec<Value>> {
    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Object(mut nodes) = row else {
            return Err(AppError::Invariant("fetch row is not an object".to_string()));
        };
        let position = nodes
            .remove(POSITION)
            .and_then(|p| p.as_i64())
            .ok_or_else(|| AppError::Invariant("fetch row has no position".to_string()))?;
        parsed.push((position, nodes));
    }
    parsed.sort_by_key(|(position, _)| *position);

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (_, mut nodes) in parsed {
        let root = take_object(&mut nodes, ROOT_NODE)?
            .ok_or_else(|| AppError::Invariant("fetch row has no root".to_string()))?;
        let root_id = node_id(&root)
            .ok_or_else(|| AppError::Invariant("root entity has no identity".to_string()))?;

        let slot = match index.get(&root_id) {
            Some(slot) => *slot,
            None => {
                groups.push(Group::new(root_id.clone(), root));
                index.insert(root_id.clone(), groups.len() - 1);
                groups.len() - 1
            }
        };
        let group = &mut groups[slot];

        let mut row_ids: HashMap<&'static str, String> = HashMap::new();
        for relation in eager {
            let Some(object) = take_object(&mut nodes, relation.alias)? else {
                continue;
            };
            let Some(id) = node_id(&object) else {
                continue;
            };
            let parent = match relation.parent {
                None => root_id.clone(),
                Some(parent) => match row_ids.get(parent.alias) {
                    Some(parent_id) => parent_id.clone(),
                    None => continue,
                },
            };
            row_ids.insert(relation.alias, id.clone());
            group.push(relation.alias, parent, id, object);
        }
    }

    Ok(groups.into_iter().map(|g| g.build(eager)).collect())
}
