//! Account, address book and role endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use common::{AddressId, UserId};
use domain::identity::{Address, AddressInput};
use domain::{Page, Role, Store, User};
use serde::Deserialize;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RolesRequest {
    pub roles: BTreeSet<Role>,
}

/// GET /users/me
pub async fn me(AuthUser(user): AuthUser) -> axum::Json<User> {
    axum::Json(user)
}

/// GET /users: admin only.
#[tracing::instrument(skip(state, requester), fields(requester = %requester.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<User>>, ApiError> {
    let page = state
        .identity
        .list_users(&requester, query.page_request())
        .await?;
    Ok(axum::Json(page))
}

/// GET /users/{id}
#[tracing::instrument(skip(state, requester), fields(requester = %requester.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<UserId>,
) -> Result<axum::Json<User>, ApiError> {
    Ok(axum::Json(state.identity.get_user_for(&requester, id).await?))
}

/// DELETE /users/{id}: deactivates the account.
#[tracing::instrument(skip(state, requester), fields(requester = %requester.id))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.identity.deactivate_user(&requester, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{id}/addresses
#[tracing::instrument(skip(state, requester, req), fields(requester = %requester.id))]
pub async fn add_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<UserId>,
    Json(req): Json<AddressInput>,
) -> Result<(StatusCode, axum::Json<Address>), ApiError> {
    let address = state.identity.add_address(&requester, id, req).await?;
    Ok((StatusCode::CREATED, axum::Json(address)))
}

/// DELETE /users/{id}/addresses/{address_id}
#[tracing::instrument(skip(state, requester), fields(requester = %requester.id))]
pub async fn remove_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path((id, address_id)): Path<(UserId, AddressId)>,
) -> Result<StatusCode, ApiError> {
    state
        .identity
        .remove_address(&requester, id, address_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /users/{id}/roles: admin only.
#[tracing::instrument(skip(state, requester, req), fields(requester = %requester.id))]
pub async fn set_roles<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<UserId>,
    Json(req): Json<RolesRequest>,
) -> Result<axum::Json<User>, ApiError> {
    let user = state.identity.set_roles(&requester, id, req.roles).await?;
    Ok(axum::Json(user))
}
