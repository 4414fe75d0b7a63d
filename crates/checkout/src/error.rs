//! Checkout error types.

use common::ProductId;
use domain::{DomainError, RepositoryError};
use thiserror::Error;

/// Errors that can occur while placing or progressing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Not enough available stock to reserve a line.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// A coupon hit its usage limit between pricing and redemption.
    #[error("Coupon {code} is no longer available")]
    CouponUnavailable { code: String },

    /// The payment gateway refused the authorization.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// The payment gateway failed for another reason.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl CheckoutError {
    /// Label used for the `order_placement_failures_total` metric.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::CouponUnavailable { .. } => "coupon_unavailable",
            CheckoutError::PaymentDeclined(_) => "payment_declined",
            CheckoutError::Gateway(_) => "gateway_error",
            CheckoutError::Domain(DomainError::Validation(_)) => "invalid_request",
            CheckoutError::Domain(DomainError::NotFound { .. }) => "not_found",
            CheckoutError::Domain(_) => "domain_error",
        }
    }
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        CheckoutError::Domain(err.into())
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
