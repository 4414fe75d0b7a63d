//! Sale endpoints. Admin only.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Percentage, SaleId};
use domain::identity::access::require_admin;
use domain::ordering::{ProductTargets, SaleInput};
use domain::{Page, Sale, Store};
use serde::{Deserialize, Serialize};

use super::{PageQuery, default_true};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SaleRequest {
    pub name: String,
    pub percentage: Percentage,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub targets: ProductTargets,
}

impl From<SaleRequest> for SaleInput {
    fn from(req: SaleRequest) -> Self {
        Self {
            name: req.name,
            percentage: req.percentage,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            is_active: req.is_active,
            targets: req.targets,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub id: SaleId,
    pub name: String,
    pub percentage: Percentage,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub targets: ProductTargets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Sale> for SaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            id: sale.id,
            name: sale.name,
            percentage: sale.percentage,
            starts_at: sale.window.starts_at(),
            ends_at: sale.window.ends_at(),
            is_active: sale.is_active,
            targets: sale.targets,
            created_at: sale.created_at,
            updated_at: sale.updated_at,
        }
    }
}

/// GET /sales
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<SaleResponse>>, ApiError> {
    require_admin(&user)?;
    let sales = state.promotions.list_sales(query.page_request()).await?;
    Ok(axum::Json(sales.map(SaleResponse::from)))
}

/// GET /sales/{id}
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<SaleId>,
) -> Result<axum::Json<SaleResponse>, ApiError> {
    require_admin(&user)?;
    Ok(axum::Json(state.promotions.get_sale(id).await?.into()))
}

/// POST /sales
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<SaleRequest>,
) -> Result<(StatusCode, axum::Json<SaleResponse>), ApiError> {
    require_admin(&user)?;
    let sale = state.promotions.create_sale(req.into()).await?;
    Ok((StatusCode::CREATED, axum::Json(sale.into())))
}

/// PUT /sales/{id}
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<SaleId>,
    Json(req): Json<SaleRequest>,
) -> Result<axum::Json<SaleResponse>, ApiError> {
    require_admin(&user)?;
    Ok(axum::Json(state.promotions.update_sale(id, req.into()).await?.into()))
}

/// DELETE /sales/{id}: soft delete.
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<SaleId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    state.promotions.deactivate_sale(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
