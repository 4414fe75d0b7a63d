//! Shipping method endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, ShippingMethodId};
use domain::identity::access::require_admin;
use domain::ordering::ShippingMethodInput;
use domain::{Page, ShippingMethod, Store};
use serde::{Deserialize, Serialize};

use super::default_true;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ShippingMethodQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Honoured for admins only.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct ShippingMethodRequest {
    pub name: String,
    pub price_cents: i64,
    pub estimated_days: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl From<ShippingMethodRequest> for ShippingMethodInput {
    fn from(req: ShippingMethodRequest) -> Self {
        Self {
            name: req.name,
            price: Money::from_cents(req.price_cents),
            estimated_days: req.estimated_days,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShippingMethodResponse {
    pub id: ShippingMethodId,
    pub name: String,
    pub price_cents: i64,
    pub estimated_days: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShippingMethod> for ShippingMethodResponse {
    fn from(method: ShippingMethod) -> Self {
        Self {
            id: method.id,
            name: method.name,
            price_cents: method.price.cents(),
            estimated_days: method.estimated_days,
            is_active: method.is_active,
            created_at: method.created_at,
            updated_at: method.updated_at,
        }
    }
}

/// GET /shipping-methods: cheapest first.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    requester: MaybeAuthUser,
    Query(query): Query<ShippingMethodQuery>,
) -> Result<axum::Json<Page<ShippingMethodResponse>>, ApiError> {
    let include_inactive = query.include_inactive && requester.is_admin();
    let methods = state.promotions.list_shipping_methods(include_inactive).await?;
    let page = domain::PageRequest::from_query(query.page, query.per_page).slice(methods);
    Ok(axum::Json(page.map(ShippingMethodResponse::from)))
}

/// POST /shipping-methods
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ShippingMethodRequest>,
) -> Result<(StatusCode, axum::Json<ShippingMethodResponse>), ApiError> {
    require_admin(&user)?;
    let method = state.promotions.create_shipping_method(req.into()).await?;
    Ok((StatusCode::CREATED, axum::Json(method.into())))
}

/// PUT /shipping-methods/{id}
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ShippingMethodId>,
    Json(req): Json<ShippingMethodRequest>,
) -> Result<axum::Json<ShippingMethodResponse>, ApiError> {
    require_admin(&user)?;
    let method = state.promotions.update_shipping_method(id, req.into()).await?;
    Ok(axum::Json(method.into()))
}

/// DELETE /shipping-methods/{id}: soft delete.
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ShippingMethodId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    state.promotions.deactivate_shipping_method(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
