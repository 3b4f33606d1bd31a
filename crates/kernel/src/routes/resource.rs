//! List, search and get routes shared by every resource.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ValidationError};
use crate::gather::{
    FilterRequest, PaginationRequest, PaginationResponse, RawFilter, RawPagination, RawSortEntry,
    SortRequest,
};
use crate::resources::Resource;
use crate::state::AppState;

/// Create the router for one resource.
pub fn router<R: Resource>() -> Router<AppState> {
    Router::new()
        .route(&format!("/{}", R::PATH), get(list::<R>))
        .route(&format!("/{}/search", R::PATH), post(search::<R>))
        .route(&format!("/{}/{{key}}", R::PATH), get(show::<R>))
}

// -------------------------------------------------------------------------
// Request types
// -------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// `field[:asc|desc][,field…]`
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub filter: RawFilter,
    #[serde(default)]
    pub pagination: RawPagination,
    #[serde(default)]
    pub sorting: Vec<RawSortEntry>,
}

// -------------------------------------------------------------------------
// Response types
// -------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationResponse,
    pub sorting: SortRequest,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
    pub data: Vec<T>,
    pub filter: FilterRequest,
    pub pagination: PaginationResponse,
    pub sorting: SortRequest,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse<T> {
    pub data: T,
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

async fn list<R: Resource>(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<ListResponse<R::Model>>> {
    let Query(params) = params.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let registries = state.registries();
    let registry = R::registry(registries);

    let sorting = SortRequest::parse_param(params.sort.as_deref(), registry)?;
    let pagination = PaginationRequest::parse(
        RawPagination {
            offset: params.offset,
            limit: params.limit,
        },
        &state.pagination(),
    )?;

    let (total, data) = R::composer(registries)
        .order_by(&sorting)
        .paginate(pagination)
        .page::<R::Model>(state.store())
        .await?;

    Ok(Json(ListResponse {
        data,
        pagination: pagination.to_response(total),
        sorting,
    }))
}

async fn search<R: Resource>(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> AppResult<Json<SearchResponse<R::Model>>> {
    let Json(body) = body.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let registries = state.registries();
    let registry = R::registry(registries);

    let filter = FilterRequest::parse(&body.filter, registry)?;
    let sorting = SortRequest::parse(&body.sorting, registry)?;
    let pagination = PaginationRequest::parse(body.pagination, &state.pagination())?;

    let (total, data) = R::composer(registries)
        .filter(&filter)
        .order_by(&sorting)
        .paginate(pagination)
        .page::<R::Model>(state.store())
        .await?;

    Ok(Json(SearchResponse {
        data,
        filter,
        pagination: pagination.to_response(total),
        sorting,
    }))
}

async fn show<R: Resource>(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<ItemResponse<R::Model>>> {
    let data = R::composer(state.registries())
        .where_by_identity_or_key(&key)
        .get_one::<R::Model>(state.store())
        .await?;

    Ok(Json(ItemResponse { data }))
}
