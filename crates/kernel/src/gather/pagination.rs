//! Pagination validation.

use serde::{Deserialize, Serialize};

use super::types::RawPagination;
use crate::error::ValidationError;

/// Default page size.
pub const DEFAULT_LIMIT: u64 = 20;

/// Largest accepted page size.
pub const MAX_LIMIT: u64 = 100;

/// Configured page-size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationBounds {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationBounds {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// Validated pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRequest {
    pub offset: u64,
    pub limit: u64,
}

/// Pagination echoed back with the total matching count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResponse {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
}

impl PaginationRequest {
    /// Validate raw input. Out-of-range values are rejected, never clamped.
    pub fn parse(raw: RawPagination, bounds: &PaginationBounds) -> Result<Self, ValidationError> {
        let offset = match raw.offset {
            None => 0,
            Some(o) => u64::try_from(o).map_err(|_| ValidationError::OffsetOutOfRange(o))?,
        };
        let limit = match raw.limit {
            None => bounds.default_limit,
            Some(l) => match u64::try_from(l) {
                Ok(l) if (1..=bounds.max_limit).contains(&l) => l,
                _ => {
                    return Err(ValidationError::LimitOutOfRange {
                        limit: l,
                        max: bounds.max_limit,
                    });
                }
            },
        };
        Ok(Self { offset, limit })
    }

    pub fn first(bounds: &PaginationBounds) -> Self {
        Self {
            offset: 0,
            limit: bounds.default_limit,
        }
    }

    pub fn to_response(&self, total: u64) -> PaginationResponse {
        PaginationResponse {
            offset: self.offset,
            limit: self.limit,
            total,
        }
    }
}
