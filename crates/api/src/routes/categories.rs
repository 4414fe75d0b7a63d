//! Category endpoints. Reads are public; writes are admin only.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use common::CategoryId;
use domain::catalog::CategoryInput;
use domain::identity::access::require_admin;
use domain::{Category, Page, Store};

use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

/// GET /categories: ordered by name.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<Category>>, ApiError> {
    let categories = state.catalog.list_categories().await?;
    Ok(axum::Json(query.page_request().slice(categories)))
}

/// GET /categories/{id}
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<CategoryId>,
) -> Result<axum::Json<Category>, ApiError> {
    Ok(axum::Json(state.catalog.get_category(id).await?))
}

/// POST /categories
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CategoryInput>,
) -> Result<(StatusCode, axum::Json<Category>), ApiError> {
    require_admin(&user)?;
    let category = state.catalog.create_category(req).await?;
    Ok((StatusCode::CREATED, axum::Json(category)))
}

/// PUT /categories/{id}
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<CategoryId>,
    Json(req): Json<CategoryInput>,
) -> Result<axum::Json<Category>, ApiError> {
    require_admin(&user)?;
    Ok(axum::Json(state.catalog.update_category(id, req).await?))
}

/// DELETE /categories/{id}: children are detached, products unlinked.
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    state.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
