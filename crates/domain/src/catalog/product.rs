//! Product aggregate with images and stock.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{CategoryId, ImageId, Money, ProductId};
use serde::{Deserialize, Serialize};

use super::Inventory;
use crate::error::ValidationErrors;
use crate::identity::check_text;

/// Maximum length of an image URL.
const MAX_URL_LENGTH: usize = 2048;

/// Highest accepted unit price.
pub const MAX_PRICE: Money = Money::from_cents(100_000_000);

/// Data for a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_ids: BTreeSet<CategoryId>,
    pub initial_stock: i64,
}

/// Partial update of a product. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category_ids: Option<BTreeSet<CategoryId>>,
    pub is_active: Option<bool>,
}

/// Image fields supplied by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageInput {
    pub url: String,
    #[serde(default)]
    pub alt_text: String,
    /// Appended after the last image when omitted.
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub url: String,
    pub alt_text: String,
    pub position: i32,
}

/// Product aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Strictly positive.
    pub price: Money,
    pub category_ids: BTreeSet<CategoryId>,
    pub inventory: Inventory,
    /// Ordered by position.
    pub images: Vec<ProductImage>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn check_price(errors: &mut ValidationErrors, price: Money) {
    if !price.is_positive() {
        errors.add("price_cents", "must be greater than zero");
    } else if price > MAX_PRICE {
        errors.add("price_cents", format!("must be at most {}", MAX_PRICE.cents()));
    }
}

impl Product {
    pub fn new(input: NewProduct, now: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_text(&mut errors, "name", &input.name);
        check_price(&mut errors, input.price);
        let inventory = Inventory::new(input.initial_stock, 0);
        if let Err(e) = &inventory {
            errors.add("initial_stock", e.to_string());
        }
        errors.into_result()?;

        Ok(Self {
            id: ProductId::new(),
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            price: input.price,
            category_ids: input.category_ids,
            inventory: inventory.unwrap_or_default(),
            images: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a partial update. Nothing changes if any field is invalid.
    pub fn update(&mut self, update: ProductUpdate, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &update.name {
            check_text(&mut errors, "name", name);
        }
        if let Some(price) = update.price {
            check_price(&mut errors, price);
        }
        errors.into_result()?;

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(category_ids) = update.category_ids {
            self.category_ids = category_ids;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.updated_at = now;
        }
    }

    pub fn in_category(&self, id: CategoryId) -> bool {
        self.category_ids.contains(&id)
    }

    /// Adds an image, keeping images ordered by position.
    pub fn add_image(&mut self, input: ImageInput, now: DateTime<Utc>) -> Result<ProductImage, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let url = input.url.trim();
        if url.is_empty() {
            errors.add("url", "must not be empty");
        } else if url.len() > MAX_URL_LENGTH {
            errors.add("url", format!("must be at most {MAX_URL_LENGTH} characters"));
        }
        if input.position.is_some_and(|p| p < 0) {
            errors.add("position", "must not be negative");
        }
        errors.into_result()?;

        let position = input.position.unwrap_or_else(|| {
            self.images
                .iter()
                .map(|image| image.position + 1)
                .max()
                .unwrap_or(0)
        });
        let image = ProductImage {
            id: ImageId::new(),
            url: url.to_string(),
            alt_text: input.alt_text.trim().to_string(),
            position,
        };
        self.images.push(image.clone());
        self.images.sort_by_key(|image| image.position);
        self.updated_at = now;
        Ok(image)
    }

    /// Removes an image. Returns false if it does not belong to the product.
    pub fn remove_image(&mut self, id: ImageId, now: DateTime<Utc>) -> bool {
        let before = self.images.len();
        self.images.retain(|image| image.id != id);
        let removed = self.images.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }
}
