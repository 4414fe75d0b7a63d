//! Coupon codes and coupons.

use chrono::{DateTime, Utc};
use common::{CouponId, Money, Percentage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DateWindow, ProductTargets};
use crate::error::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("coupon code must be {min} to {max} characters of A-Z, 0-9, '_' or '-'", min = CouponCode::MIN_LENGTH, max = CouponCode::MAX_LENGTH)]
pub struct InvalidCouponCode;

/// A coupon code, stored uppercase and matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 32;

    pub fn parse(input: &str) -> Result<Self, InvalidCouponCode> {
        let code = input.trim().to_uppercase();
        let valid_chars = code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid_chars || !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&code.len()) {
            return Err(InvalidCouponCode);
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = InvalidCouponCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

/// Coupon fields supplied by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponInput {
    pub code: String,
    pub percentage: Percentage,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub min_order_amount: Option<Money>,
    pub targets: ProductTargets,
}

impl CouponInput {
    fn validate(&self) -> Result<(CouponCode, DateWindow), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let code = CouponCode::parse(&self.code);
        if let Err(e) = &code {
            errors.add("code", e.to_string());
        }
        let window = DateWindow::new(self.starts_at, self.ends_at);
        if let Err(e) = &window {
            errors.merge(e.clone());
        }
        if self.usage_limit == Some(0) {
            errors.add("usage_limit", "must be greater than zero");
        }
        if self.min_order_amount.is_some_and(|m| m.is_negative()) {
            errors.add("min_order_amount_cents", "must not be negative");
        }
        errors.into_result()?;
        match (code, window) {
            (Ok(code), Ok(window)) => Ok((code, window)),
            (Err(e), _) => Err(ValidationErrors::single("code", e.to_string())),
            (_, Err(e)) => Err(e),
        }
    }
}

/// A percentage discount redeemed by code at checkout.
///
/// The targets act as the allowed/disallowed product and category sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub percentage: Percentage,
    pub window: DateWindow,
    pub is_active: bool,
    pub usage_limit: Option<u32>,
    pub times_used: u32,
    pub min_order_amount: Option<Money>,
    pub targets: ProductTargets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn new(input: CouponInput, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        let (code, window) = input.validate()?;
        Ok(Self {
            id: CouponId::new(),
            code,
            percentage: input.percentage,
            window,
            is_active: input.is_active,
            usage_limit: input.usage_limit,
            times_used: 0,
            min_order_amount: input.min_order_amount,
            targets: input.targets,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the editable fields. The redemption count is kept.
    pub fn update(&mut self, input: CouponInput, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let (code, window) = input.validate()?;
        self.code = code;
        self.percentage = input.percentage;
        self.window = window;
        self.is_active = input.is_active;
        self.usage_limit = input.usage_limit;
        self.min_order_amount = input.min_order_amount;
        self.targets = input.targets;
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.updated_at = now;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.times_used >= limit)
    }

    /// Returns why the coupon cannot be used on an order with `subtotal`.
    pub fn rejection_reason(&self, subtotal: Money, now: DateTime<Utc>) -> Option<String> {
        if !self.is_active {
            return Some(format!("coupon {} is not active", self.code));
        }
        if !self.window.contains(now) {
            return Some(format!("coupon {} is not valid at this time", self.code));
        }
        if self.is_exhausted() {
            return Some(format!("coupon {} has reached its usage limit", self.code));
        }
        if let Some(min) = self.min_order_amount
            && subtotal < min
        {
            return Some(format!("coupon {} requires a minimum order of {min}", self.code));
        }
        None
    }
}
