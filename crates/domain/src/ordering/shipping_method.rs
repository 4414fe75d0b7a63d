use chrono::{DateTime, Utc};
use common::{Money, ShippingMethodId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::identity::check_text;

/// Shipping method fields supplied by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingMethodInput {
    pub name: String,
    pub price: Money,
    pub estimated_days: u32,
    pub is_active: bool,
}

impl ShippingMethodInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "name", &self.name);
        if self.price.is_negative() {
            errors.add("price_cents", "must not be negative");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub price: Money,
    pub estimated_days: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingMethod {
    pub fn new(input: ShippingMethodInput, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        input.validate()?;
        Ok(Self {
            id: ShippingMethodId::new(),
            name: input.name.trim().to_string(),
            price: input.price,
            estimated_days: input.estimated_days,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, input: ShippingMethodInput, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        input.validate()?;
        self.name = input.name.trim().to_string();
        self.price = input.price;
        self.estimated_days = input.estimated_days;
        self.is_active = input.is_active;
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.updated_at = now;
        }
    }
}
