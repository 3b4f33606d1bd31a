//! Field registries.
//!
//! A [`FieldRegistry`] declares, for one resource, which logical fields may be
//! sorted or filtered, where each one lives in storage, and what kind of data
//! it holds. Registries are built once at startup and only read afterwards.

use thiserror::Error;

use super::sort::SortEntry;
use super::types::{FilterOperator, Predicate, Scalar, SortDirection};
use crate::error::ValidationError;

/// Primary key column shared by every table.
pub const ID_COLUMN: &str = "id";

/// Default canonical key column.
pub const KEY_COLUMN: &str = "slug";

/// Registry construction errors. These are programming mistakes in a
/// resource declaration and abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("field '{0}' is declared more than once")]
    DuplicateField(&'static str),

    #[error("registry for '{0}' has no identity field")]
    MissingIdentity(&'static str),

    #[error("registry declares two identity fields: '{0}' and '{1}'")]
    MultipleIdentities(&'static str, &'static str),

    #[error("field '{0}' is reached through a to-many relation")]
    ToManyField(&'static str),

    #[error("invalid default sort: {0}")]
    InvalidDefaultSort(String),
}

/// A storage accessor: a column on the root table or on a joined alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub alias: &'static str,
    pub name: &'static str,
}

impl Column {
    pub const fn new(alias: &'static str, name: &'static str) -> Self {
        Self { alias, name }
    }
}

/// How many target rows a relation yields per parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// How a relation's target is joined to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `parent.local = target.foreign`.
    Column {
        local: &'static str,
        foreign: &'static str,
    },
    /// `parent.id = junction.parent_column AND junction.target_column = target.id`.
    Junction {
        table: &'static str,
        parent_column: &'static str,
        target_column: &'static str,
    },
}

/// A named relation from a root (or another relation) to a target table.
///
/// `alias` is unique within one query and is the key used for joins and raw
/// row nodes; `name` is the key the related data is attached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub alias: &'static str,
    pub name: &'static str,
    pub table: &'static str,
    pub parent: Option<&'static Relation>,
    pub cardinality: Cardinality,
    pub link: Link,
}

impl Relation {
    /// Many-to-one through a foreign key column on the parent.
    pub const fn belongs_to(name: &'static str, table: &'static str, local: &'static str) -> Self {
        Self {
            alias: name,
            name,
            table,
            parent: None,
            cardinality: Cardinality::One,
            link: Link::Column {
                local,
                foreign: ID_COLUMN,
            },
        }
    }

    /// One-to-many through a foreign key column on the target.
    pub const fn has_many(name: &'static str, table: &'static str, foreign: &'static str) -> Self {
        Self {
            alias: name,
            name,
            table,
            parent: None,
            cardinality: Cardinality::Many,
            link: Link::Column {
                local: ID_COLUMN,
                foreign,
            },
        }
    }

    /// Many-to-many through a junction table.
    pub const fn many_through(
        name: &'static str,
        table: &'static str,
        junction: &'static str,
        parent_column: &'static str,
        target_column: &'static str,
    ) -> Self {
        Self {
            alias: name,
            name,
            table,
            parent: None,
            cardinality: Cardinality::Many,
            link: Link::Junction {
                table: junction,
                parent_column,
                target_column,
            },
        }
    }

    /// Re-root this relation under `parent`, giving it a query-unique alias.
    pub const fn under(self, parent: &'static Relation, alias: &'static str) -> Self {
        Self {
            alias,
            parent: Some(parent),
            ..self
        }
    }

    pub fn parent_alias(&self) -> Option<&'static str> {
        self.parent.map(|p| p.alias)
    }

    /// This relation and its ancestors, outermost first.
    pub fn lineage(&'static self) -> Vec<&'static Relation> {
        let mut chain = vec![self];
        let mut current = self.parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = parent.parent;
        }
        chain.reverse();
        chain
    }

    /// True if this relation or any ancestor is to-many.
    pub fn fans_out(&self) -> bool {
        self.cardinality == Cardinality::Many || self.parent.is_some_and(|p| p.fans_out())
    }
}

/// Data kind of a field; decides which filter operators apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
    /// Closed set of textual variants.
    Enum(&'static [&'static str]),
    Identifier,
}

impl FieldKind {
    /// Operators a field of this kind accepts.
    pub fn operators(&self) -> &'static [FilterOperator] {
        use FilterOperator::*;
        match self {
            FieldKind::Numeric => &[Eq, Ne, Lt, Lte, Gt, Gte, In],
            FieldKind::Text => &[Eq, Contains, In],
            FieldKind::Enum(_) => &[Eq, In],
            FieldKind::Identifier => &[Eq, In],
        }
    }
}

/// One logical field exposed by a resource.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub column: &'static str,
    pub relation: Option<&'static Relation>,
    pub kind: FieldKind,
    pub sortable: bool,
    pub filterable: bool,
    pub operators: Vec<FilterOperator>,
    identity: bool,
}

impl FieldDescriptor {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column: name,
            relation: None,
            kind,
            sortable: true,
            filterable: true,
            operators: kind.operators().to_vec(),
            identity: false,
        }
    }

    /// The resource's own identifier (primary key).
    pub fn identity(name: &'static str) -> Self {
        Self {
            identity: true,
            ..Self::new(name, FieldKind::Identifier)
        }
    }

    /// An identifier of some other entity (foreign key).
    pub fn reference(name: &'static str) -> Self {
        Self::new(name, FieldKind::Identifier)
    }

    pub fn numeric(name: &'static str) -> Self {
        Self::new(name, FieldKind::Numeric)
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn enumeration(name: &'static str, variants: &'static [&'static str]) -> Self {
        Self::new(name, FieldKind::Enum(variants))
    }

    /// Read the value from `column` of a joined relation.
    pub fn via(mut self, relation: &'static Relation, column: &'static str) -> Self {
        self.relation = Some(relation);
        self.column = column;
        self
    }

    /// Store under a column whose name differs from the logical name.
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    pub fn sort_only(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn filter_only(mut self) -> Self {
        self.sortable = false;
        self
    }

    /// Narrow the kind's operator set. Operators outside it are ignored.
    pub fn operators(mut self, allowed: &[FilterOperator]) -> Self {
        self.operators.retain(|op| allowed.contains(op));
        self
    }

    pub fn allows(&self, operator: FilterOperator) -> bool {
        self.operators.contains(&operator)
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }
}

/// The sortable/filterable fields of one resource.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    table: &'static str,
    key_column: &'static str,
    fields: Vec<FieldDescriptor>,
    identity: usize,
    default_sort: Vec<SortEntry>,
}

impl FieldRegistry {
    /// Build a registry for `table` from its field declarations.
    pub fn register(
        table: &'static str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut identity: Option<usize> = None;

        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(RegistryError::DuplicateField(field.name));
            }
            if field.relation.is_some_and(|r| r.fans_out()) {
                return Err(RegistryError::ToManyField(field.name));
            }
            if field.identity {
                if let Some(existing) = identity {
                    return Err(RegistryError::MultipleIdentities(
                        fields[existing].name,
                        field.name,
                    ));
                }
                identity = Some(i);
            }
        }

        let identity = identity.ok_or(RegistryError::MissingIdentity(table))?;
        let default_sort = vec![SortEntry {
            field: fields[identity].name,
            direction: SortDirection::Asc,
        }];

        Ok(Self {
            table,
            key_column: KEY_COLUMN,
            fields,
            identity,
            default_sort,
        })
    }

    pub fn with_key_column(mut self, column: &'static str) -> Self {
        self.key_column = column;
        self
    }

    /// Replace the sort used when a request names none.
    pub fn with_default_sort(
        mut self,
        entries: &[(&str, SortDirection)],
    ) -> Result<Self, RegistryError> {
        if entries.is_empty() {
            return Err(RegistryError::InvalidDefaultSort(
                "at least one field is required".to_string(),
            ));
        }
        let mut resolved = Vec::with_capacity(entries.len());
        for (name, direction) in entries {
            let field = self
                .resolve_sort(name)
                .map_err(|e| RegistryError::InvalidDefaultSort(e.to_string()))?;
            resolved.push(SortEntry {
                field: field.name,
                direction: *direction,
            });
        }
        self.default_sort = resolved;
        Ok(self)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn identity(&self) -> &FieldDescriptor {
        &self.fields[self.identity]
    }

    pub fn identity_column(&self) -> Column {
        self.accessor(self.identity())
    }

    pub fn key_column(&self) -> Column {
        Column::new(self.table, self.key_column)
    }

    pub fn default_sort(&self) -> &[SortEntry] {
        &self.default_sort
    }

    /// Where a field's value lives in a query.
    pub fn accessor(&self, field: &FieldDescriptor) -> Column {
        let alias = field.relation.map_or(self.table, |r| r.alias);
        Column::new(alias, field.column)
    }

    /// Lookup predicate for a path segment: an all-digit value is an identity,
    /// anything else a canonical key. A key made only of digits is therefore
    /// unreachable through this lookup.
    pub fn identity_or_key(&self, value: &str) -> Predicate {
        let as_identity = if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            value.parse::<i64>().ok()
        } else {
            None
        };
        match as_identity {
            Some(id) => Predicate::eq(self.identity_column(), Scalar::Integer(id)),
            None => Predicate::eq(self.key_column(), Scalar::Text(value.to_string())),
        }
    }

    pub fn resolve_sort(&self, name: &str) -> Result<&FieldDescriptor, ValidationError> {
        let field = self
            .get(name)
            .ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;
        if !field.sortable {
            return Err(ValidationError::NotSortable(name.to_string()));
        }
        Ok(field)
    }

    pub fn resolve_filter(&self, name: &str) -> Result<&FieldDescriptor, ValidationError> {
        let field = self
            .get(name)
            .ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;
        if !field.filterable {
            return Err(ValidationError::NotFilterable(name.to_string()));
        }
        Ok(field)
    }
}
