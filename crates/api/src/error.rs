//! API error types rendered as `application/problem+json`.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{DomainError, ValidationErrors};
use serde::Serialize;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (body, path or query).
    #[error("{0}")]
    BadRequest(String),

    /// Field-level validation failures.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// A business rule rejected an otherwise well-formed request.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Internal server error. The message is logged, never returned.
    #[error("{0}")]
    Internal(String),
}

/// RFC 7807 problem document.
#[derive(Debug, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("missing or invalid bearer token".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::Rejected(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad request",
            ApiError::Validation(_) => "Validation failed",
            ApiError::Rejected(_) => "Request rejected",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "Not found",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Internal(_) => "Internal server error",
        }
    }

    /// Builds the problem document for this error.
    pub fn to_problem(&self) -> Problem {
        let (detail, errors) = match self {
            ApiError::Validation(errors) => (
                "one or more fields are invalid".to_string(),
                errors.fields().clone(),
            ),
            ApiError::Internal(_) => ("an internal error occurred".to_string(), BTreeMap::new()),
            other => (other.to_string(), BTreeMap::new()),
        };
        Problem {
            kind: "about:blank",
            title: self.title(),
            status: self.status().as_u16(),
            detail,
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(msg) = &self {
            tracing::error!(error = %msg, "internal server error");
        }
        let status = self.status();
        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(self.to_problem()),
        )
            .into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(errors) => ApiError::Validation(errors),
            DomainError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            DomainError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            DomainError::Order(e) => ApiError::Conflict(e.to_string()),
            DomainError::Inventory(e) => ApiError::Conflict(e.to_string()),
            DomainError::Repository(_) | DomainError::PasswordHash(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Domain(e) => e.into(),
            CheckoutError::InsufficientStock { .. } | CheckoutError::CouponUnavailable { .. } => {
                ApiError::Conflict(err.to_string())
            }
            CheckoutError::PaymentDeclined(_) => ApiError::Rejected(err.to_string()),
            CheckoutError::Gateway(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use domain::RepositoryError;

    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::invalid("name", "must not be empty"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("product", "x"), StatusCode::NOT_FOUND),
            (DomainError::Conflict("email taken".into()), StatusCode::CONFLICT),
            (DomainError::Forbidden("admin role required".into()), StatusCode::FORBIDDEN),
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                DomainError::Repository(RepositoryError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn checkout_errors_map_to_statuses() {
        let stock = CheckoutError::InsufficientStock {
            product_id: ProductId::new(),
        };
        assert_eq!(ApiError::from(stock).status(), StatusCode::CONFLICT);
        let declined = CheckoutError::PaymentDeclined("card refused".into());
        assert_eq!(ApiError::from(declined).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_problem_lists_fields() {
        let problem = ApiError::from(DomainError::invalid("price_cents", "must be positive")).to_problem();
        assert_eq!(problem.status, 400);
        assert_eq!(problem.title, "Validation failed");
        assert_eq!(problem.errors["price_cents"], vec!["must be positive".to_string()]);
    }

    #[test]
    fn internal_detail_is_redacted() {
        let problem = ApiError::Internal("connection refused to 10.0.0.5".into()).to_problem();
        assert_eq!(problem.status, 500);
        assert!(!problem.detail.contains("10.0.0.5"));

        let json = serde_json::to_value(&problem).unwrap();
        assert_eq!(json["type"], "about:blank");
        assert!(json.get("errors").is_none());
    }
}
