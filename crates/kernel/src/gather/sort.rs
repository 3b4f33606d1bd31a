//! Sort validation.

use serde::Serialize;

use super::registry::FieldRegistry;
use super::types::{OrderTerm, RawSortEntry, SortDirection};
use crate::error::ValidationError;

/// A validated sort entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortEntry {
    pub field: &'static str,
    pub direction: SortDirection,
}

/// Validated, ordered sort request. Serializes as `[{field, direction}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SortRequest {
    entries: Vec<SortEntry>,
}

impl SortRequest {
    /// Validate raw entries against a registry.
    ///
    /// An empty input yields the registry's default sort.
    pub fn parse(raw: &[RawSortEntry], registry: &FieldRegistry) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Ok(Self::default_for(registry));
        }

        let mut entries = Vec::with_capacity(raw.len());
        for entry in raw {
            let field = registry.resolve_sort(&entry.field)?;
            let direction = match entry.direction.as_deref() {
                Some(d) => d.parse()?,
                None => SortDirection::Asc,
            };
            entries.push(SortEntry {
                field: field.name,
                direction,
            });
        }
        Ok(Self { entries })
    }

    /// Parse the `sort` query parameter: `field[:asc|desc][,field…]`.
    pub fn parse_param(
        param: Option<&str>,
        registry: &FieldRegistry,
    ) -> Result<Self, ValidationError> {
        let raw: Vec<RawSortEntry> = param
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once(':') {
                Some((field, direction)) => RawSortEntry {
                    field: field.trim().to_string(),
                    direction: Some(direction.trim().to_string()),
                },
                None => RawSortEntry {
                    field: part.to_string(),
                    direction: None,
                },
            })
            .collect();
        Self::parse(&raw, registry)
    }

    pub fn default_for(registry: &FieldRegistry) -> Self {
        Self {
            entries: registry.default_sort().to_vec(),
        }
    }

    pub fn entries(&self) -> &[SortEntry] {
        &self.entries
    }

    /// ORDER BY terms: the requested fields, then the identity ascending
    /// unless it was already named.
    pub fn order_terms(&self, registry: &FieldRegistry) -> Vec<OrderTerm> {
        let identity = registry.identity();
        let mut terms = Vec::with_capacity(self.entries.len() + 1);
        let mut has_identity = false;

        for entry in &self.entries {
            let Some(field) = registry.get(entry.field) else {
                continue;
            };
            has_identity |= field.is_identity();
            terms.push(OrderTerm {
                column: registry.accessor(field),
                direction: entry.direction,
            });
        }

        if !has_identity {
            terms.push(OrderTerm {
                column: registry.accessor(identity),
                direction: SortDirection::Asc,
            });
        }
        terms
    }
}
