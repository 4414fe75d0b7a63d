//! Coupon endpoints. Admin only.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CouponId, Money, Percentage};
use domain::identity::access::require_admin;
use domain::ordering::{CouponCode, CouponInput, ProductTargets};
use domain::{Coupon, Page, Store};
use serde::{Deserialize, Serialize};

use super::{PageQuery, default_true};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CouponRequest {
    pub code: String,
    pub percentage: Percentage,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub min_order_amount_cents: Option<i64>,
    #[serde(default)]
    pub targets: ProductTargets,
}

impl From<CouponRequest> for CouponInput {
    fn from(req: CouponRequest) -> Self {
        Self {
            code: req.code,
            percentage: req.percentage,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            is_active: req.is_active,
            usage_limit: req.usage_limit,
            min_order_amount: req.min_order_amount_cents.map(Money::from_cents),
            targets: req.targets,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CouponResponse {
    pub id: CouponId,
    pub code: CouponCode,
    pub percentage: Percentage,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub times_used: u32,
    pub min_order_amount_cents: Option<i64>,
    pub targets: ProductTargets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Coupon> for CouponResponse {
    fn from(coupon: Coupon) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code,
            percentage: coupon.percentage,
            starts_at: coupon.window.starts_at(),
            ends_at: coupon.window.ends_at(),
            is_active: coupon.is_active,
            usage_limit: coupon.usage_limit,
            times_used: coupon.times_used,
            min_order_amount_cents: coupon.min_order_amount.map(|m| m.cents()),
            targets: coupon.targets,
            created_at: coupon.created_at,
            updated_at: coupon.updated_at,
        }
    }
}

/// GET /coupons
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<CouponResponse>>, ApiError> {
    require_admin(&user)?;
    let coupons = state.promotions.list_coupons(query.page_request()).await?;
    Ok(axum::Json(coupons.map(CouponResponse::from)))
}

/// GET /coupons/{id}
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<CouponId>,
) -> Result<axum::Json<CouponResponse>, ApiError> {
    require_admin(&user)?;
    Ok(axum::Json(state.promotions.get_coupon(id).await?.into()))
}

/// POST /coupons
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CouponRequest>,
) -> Result<(StatusCode, axum::Json<CouponResponse>), ApiError> {
    require_admin(&user)?;
    let coupon = state.promotions.create_coupon(req.into()).await?;
    Ok((StatusCode::CREATED, axum::Json(coupon.into())))
}

/// PUT /coupons/{id}
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<CouponId>,
    Json(req): Json<CouponRequest>,
) -> Result<axum::Json<CouponResponse>, ApiError> {
    require_admin(&user)?;
    Ok(axum::Json(state.promotions.update_coupon(id, req.into()).await?.into()))
}

/// DELETE /coupons/{id}: soft delete.
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<CouponId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    state.promotions.deactivate_coupon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
