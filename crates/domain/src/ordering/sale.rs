use chrono::{DateTime, Utc};
use common::{Percentage, SaleId};
use serde::{Deserialize, Serialize};

use super::{DateWindow, ProductTargets};
use crate::error::ValidationErrors;
use crate::identity::check_text;

/// Sale fields supplied by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleInput {
    pub name: String,
    pub percentage: Percentage,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub targets: ProductTargets,
}

impl SaleInput {
    fn validate(&self) -> Result<DateWindow, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "name", &self.name);
        let window = DateWindow::new(self.starts_at, self.ends_at);
        if let Err(e) = &window {
            errors.merge(e.clone());
        }
        errors.into_result()?;
        window
    }
}

/// An automatic percentage discount applied to matching lines while running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub name: String,
    pub percentage: Percentage,
    pub window: DateWindow,
    pub is_active: bool,
    pub targets: ProductTargets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(input: SaleInput, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        let window = input.validate()?;
        Ok(Self {
            id: SaleId::new(),
            name: input.name.trim().to_string(),
            percentage: input.percentage,
            window,
            is_active: input.is_active,
            targets: input.targets,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, input: SaleInput, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let window = input.validate()?;
        self.name = input.name.trim().to_string();
        self.percentage = input.percentage;
        self.window = window;
        self.is_active = input.is_active;
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

    /// Active and within its window.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.window.contains(now)
    }
}
