//! Registration and login endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::identity::Registration;
use domain::{Role, Store, User};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::Json;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

// -- Handlers --

/// POST /auth/register: creates a customer account.
#[tracing::instrument(skip_all)]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, axum::Json<User>), ApiError> {
    let user = state.identity.register_customer(req).await?;
    Ok((StatusCode::CREATED, axum::Json(user)))
}

/// POST /auth/carriers/register: creates a carrier account.
#[tracing::instrument(skip_all)]
pub async fn register_carrier<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, axum::Json<User>), ApiError> {
    let user = state.identity.register_carrier(req).await?;
    Ok((StatusCode::CREATED, axum::Json(user)))
}

/// POST /auth/login: exchanges credentials for a bearer token.
#[tracing::instrument(skip_all)]
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginRequest>,
) -> Result<axum::Json<LoginResponse>, ApiError> {
    issue_token(&state, req, None).await
}

/// POST /auth/carriers/login: like login, but the account must be a carrier.
#[tracing::instrument(skip_all)]
pub async fn login_carrier<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginRequest>,
) -> Result<axum::Json<LoginResponse>, ApiError> {
    issue_token(&state, req, Some(Role::Carrier)).await
}

async fn issue_token<S: Store>(
    state: &AppState<S>,
    req: LoginRequest,
    required_role: Option<Role>,
) -> Result<axum::Json<LoginResponse>, ApiError> {
    let user = state
        .identity
        .authenticate(&req.email, &req.password, required_role)
        .await?;
    let issued = state.tokens.issue(user.id, Utc::now());
    Ok(axum::Json(LoginResponse {
        access_token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        user,
    }))
}
