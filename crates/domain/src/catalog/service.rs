//! Catalog administration and browsing.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use common::{CategoryId, ImageId, ProductId};

use super::{
    Category, CategoryInput, ImageInput, Inventory, InventoryError, NewProduct, Product,
    ProductImage, ProductUpdate,
};
use crate::error::{DomainError, Result, ValidationErrors};
use crate::pagination::{Page, PageRequest};
use crate::ports::{CategoryRepository, ProductFilter, ProductRepository};

/// Service for categories, products, images and stock.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: CategoryRepository + ProductRepository> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, input: CategoryInput) -> Result<Category> {
        let category = Category::new(input, Utc::now())?;
        let existing = self.store.list_categories().await?;
        self.check_category(&category, &existing)?;
        self.store.insert_category(&category).await?;
        tracing::info!(category_id = %category.id, "category created");
        Ok(category)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_category(&self, id: CategoryId, input: CategoryInput) -> Result<Category> {
        let mut category = self.get_category(id).await?;
        category.update(input, Utc::now())?;
        let existing = self.store.list_categories().await?;
        self.check_category(&category, &existing)?;
        self.store.save_category(&category).await?;
        Ok(category)
    }

    /// Checks name uniqueness and that the parent exists without forming a
    /// cycle.
    fn check_category(&self, category: &Category, existing: &[Category]) -> Result<()> {
        if existing
            .iter()
            .any(|other| other.id != category.id && other.has_name(&category.name))
        {
            return Err(DomainError::Conflict(format!(
                "category '{}' already exists",
                category.name
            )));
        }

        let Some(parent_id) = category.parent_id else {
            return Ok(());
        };
        let parents: HashMap<CategoryId, Option<CategoryId>> =
            existing.iter().map(|c| (c.id, c.parent_id)).collect();
        if !parents.contains_key(&parent_id) {
            return Err(DomainError::invalid("parent_id", "parent category does not exist"));
        }

        let mut cursor = Some(parent_id);
        let mut seen = BTreeSet::new();
        while let Some(id) = cursor {
            if id == category.id || !seen.insert(id) {
                return Err(DomainError::invalid(
                    "parent_id",
                    "parent would create a category cycle",
                ));
            }
            cursor = parents.get(&id).copied().flatten();
        }
        Ok(())
    }

    /// Deletes a category and unlinks it from every product.
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        if !self.store.delete_category(id).await? {
            return Err(DomainError::not_found("category", id));
        }
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.store
            .find_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    async fn check_categories_exist(&self, ids: &BTreeSet<CategoryId>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let known: BTreeSet<CategoryId> = self
            .store
            .list_categories()
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let mut errors = ValidationErrors::new();
        for id in ids.difference(&known) {
            errors.add("category_ids", format!("category {id} does not exist"));
        }
        Ok(errors.into_result()?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let product = Product::new(input, Utc::now())?;
        self.check_categories_exist(&product.category_ids).await?;
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut product = self.load_product(id).await?;
        if let Some(ids) = &update.category_ids {
            self.check_categories_exist(ids).await?;
        }
        product.update(update, Utc::now())?;
        self.store.save_product(&product).await?;
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<()> {
        let mut product = self.load_product(id).await?;
        product.deactivate(Utc::now());
        self.store.save_product(&product).await?;
        tracing::info!(product_id = %id, "product deactivated");
        Ok(())
    }

    /// Loads a product. Inactive products are hidden unless
    /// `include_inactive` is set.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId, include_inactive: bool) -> Result<Product> {
        let product = self.load_product(id).await?;
        if !product.is_active && !include_inactive {
            return Err(DomainError::not_found("product", id));
        }
        Ok(product)
    }

    async fn load_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        Ok(self.store.list_products(&filter, page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_image(&self, id: ProductId, input: ImageInput) -> Result<ProductImage> {
        let mut product = self.load_product(id).await?;
        let image = product.add_image(input, Utc::now())?;
        self.store.save_product(&product).await?;
        Ok(image)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_image(&self, id: ProductId, image_id: ImageId) -> Result<()> {
        let mut product = self.load_product(id).await?;
        if !product.remove_image(image_id, Utc::now()) {
            return Err(DomainError::not_found("image", image_id));
        }
        self.store.save_product(&product).await?;
        Ok(())
    }

    /// Adds `delta` to on-hand stock.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_inventory(&self, id: ProductId, delta: i64) -> Result<Inventory> {
        match self.store.adjust_stock(id, delta).await? {
            Some(inventory) => {
                metrics::counter!("inventory_adjustments_total").increment(1);
                tracing::info!(product_id = %id, delta, on_hand = inventory.on_hand(), "stock adjusted");
                Ok(inventory)
            }
            None => {
                let mut current = self.load_product(id).await?.inventory;
                Err(current.adjust(delta).err().unwrap_or(InventoryError::NegativeStock).into())
            }
        }
    }

    /// Replaces on-hand stock.
    #[tracing::instrument(skip(self))]
    pub async fn set_stock(&self, id: ProductId, on_hand: i64) -> Result<Inventory> {
        if on_hand < 0 {
            return Err(DomainError::invalid("on_hand", "must not be negative"));
        }
        match self.store.set_stock(id, on_hand).await? {
            Some(inventory) => {
                metrics::counter!("inventory_adjustments_total").increment(1);
                tracing::info!(product_id = %id, on_hand, "stock set");
                Ok(inventory)
            }
            None => {
                let reserved = self.load_product(id).await?.inventory.reserved();
                Err(InventoryError::BelowReserved { on_hand, reserved }.into())
            }
        }
    }
}
