use chrono::{DateTime, Utc};
use common::CategoryId;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::identity::check_text;

/// Category fields supplied by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl CategoryInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "name", &self.name);
        errors.into_result()
    }
}

/// A product category, optionally nested under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(input: CategoryInput, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        input.validate()?;
        Ok(Self {
            id: CategoryId::new(),
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            parent_id: input.parent_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the editable fields. A category cannot be its own parent.
    pub fn update(&mut self, input: CategoryInput, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = match input.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if input.parent_id == Some(self.id) {
            errors.add("parent_id", "a category cannot be its own parent");
        }
        errors.into_result()?;

        self.name = input.name.trim().to_string();
        self.description = input.description.trim().to_string();
        self.parent_id = input.parent_id;
        self.updated_at = now;
        Ok(())
    }

    /// Case-insensitive name comparison used for uniqueness.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}
