use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use common::{CategoryId, ImageId, Money, ProductId};
use domain::catalog::{Category, Inventory, Product, ProductImage};
use domain::ports::{CategoryRepository, ProductFilter, ProductRepository};
use domain::{Page, PageRequest, RepositoryError, RepositoryResult};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::{corrupt, db_error};
use crate::store::{PostgresStore, limit_offset, total};

const CATEGORY_COLUMNS: &str = "id, name, description, parent_id, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price_cents, p.is_active, \
     p.created_at, p.updated_at, i.on_hand, i.reserved";

fn row_to_category(row: &PgRow) -> RepositoryResult<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        description: row.try_get("description").map_err(db_error)?,
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")
            .map_err(db_error)?
            .map(CategoryId::from_uuid),
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn row_to_inventory(row: &PgRow) -> RepositoryResult<Inventory> {
    let on_hand: i64 = row.try_get("on_hand").map_err(db_error)?;
    let reserved: i64 = row.try_get("reserved").map_err(db_error)?;
    inventory_from(on_hand, reserved)
}

fn row_to_product(row: &PgRow) -> RepositoryResult<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        description: row.try_get("description").map_err(db_error)?,
        price: Money::from_cents(row.try_get("price_cents").map_err(db_error)?),
        category_ids: BTreeSet::new(),
        inventory: row_to_inventory(row)?,
        images: Vec::new(),
        is_active: row.try_get("is_active").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

/// Loads category links and images for the given product rows.
async fn hydrate(pool: &PgPool, rows: Vec<PgRow>) -> RepositoryResult<Vec<Product>> {
    let mut products = rows
        .iter()
        .map(row_to_product)
        .collect::<RepositoryResult<Vec<_>>>()?;
    if products.is_empty() {
        return Ok(products);
    }
    let ids: Vec<Uuid> = products.iter().map(|p| p.id.as_uuid()).collect();

    let mut categories: HashMap<Uuid, BTreeSet<CategoryId>> = HashMap::new();
    for row in sqlx::query(
        "SELECT product_id, category_id FROM product_categories WHERE product_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let product_id: Uuid = row.try_get("product_id").map_err(db_error)?;
        let category_id: Uuid = row.try_get("category_id").map_err(db_error)?;
        categories
            .entry(product_id)
            .or_default()
            .insert(CategoryId::from_uuid(category_id));
    }

    let mut images: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
    for row in sqlx::query(
        r#"
        SELECT id, product_id, url, alt_text, position
        FROM product_images
        WHERE product_id = ANY($1)
        ORDER BY position ASC, id ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let product_id: Uuid = row.try_get("product_id").map_err(db_error)?;
        images.entry(product_id).or_default().push(ProductImage {
            id: ImageId::from_uuid(row.try_get("id").map_err(db_error)?),
            url: row.try_get("url").map_err(db_error)?,
            alt_text: row.try_get("alt_text").map_err(db_error)?,
            position: row.try_get("position").map_err(db_error)?,
        });
    }

    for product in &mut products {
        let id = product.id.as_uuid();
        product.category_ids = categories.remove(&id).unwrap_or_default();
        product.images = images.remove(&id).unwrap_or_default();
    }
    Ok(products)
}

/// Replaces the category links and images of a product.
async fn write_children(conn: &mut PgConnection, product: &Product) -> RepositoryResult<()> {
    let id = product.id.as_uuid();
    sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    sqlx::query("DELETE FROM product_images WHERE product_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    for category_id in &product.category_ids {
        sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
            .bind(id)
            .bind(category_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }
    for image in &product.images {
        sqlx::query(
            r#"
            INSERT INTO product_images (id, product_id, url, alt_text, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(image.id.as_uuid())
        .bind(id)
        .bind(&image.url)
        .bind(&image.alt_text)
        .bind(image.position)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

fn inventory_from(on_hand: i64, reserved: i64) -> RepositoryResult<Inventory> {
    Inventory::new(on_hand, reserved).map_err(|e| corrupt("inventory", e))
}

#[async_trait]
impl CategoryRepository for PostgresStore {
    #[tracing::instrument(skip(self, category), fields(category_id = %category.id))]
    async fn insert_category(&self, category: &Category) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, parent_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.parent_id.map(|p| p.as_uuid()))
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, category), fields(category_id = %category.id))]
    async fn save_category(&self, category: &Category) -> RepositoryResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, description = $3, parent_id = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.parent_id.map(|p| p.as_uuid()))
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "category {} does not exist",
                category.id
            )));
        }
        Ok(())
    }

    async fn find_category(&self, id: CategoryId) -> RepositoryResult<Option<Category>> {
        sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .as_ref()
        .map(row_to_category)
        .transpose()
    }

    async fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
        sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY lower(name) ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_category)
        .collect()
    }

    /// Child categories lose their parent and product links cascade.
    #[tracing::instrument(skip(self))]
    async fn delete_category(&self, id: CategoryId) -> RepositoryResult<bool> {
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    async fn insert_product(&self, product: &Product) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "INSERT INTO inventories (product_id, on_hand, reserved, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(product.id.as_uuid())
        .bind(product.inventory.on_hand())
        .bind(product.inventory.reserved())
        .bind(product.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_children(&mut tx, product).await?;
        tx.commit().await.map_err(db_error)
    }

    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    async fn save_product(&self, product: &Product) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, is_active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "product {} does not exist",
                product.id
            )));
        }

        write_children(&mut tx, product).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_product(&self, id: ProductId) -> RepositoryResult<Option<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN inventories i ON i.product_id = p.id WHERE p.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(hydrate(&self.pool, rows).await?.pop())
    }

    async fn find_products(&self, ids: &[ProductId]) -> RepositoryResult<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN inventories i ON i.product_id = p.id WHERE p.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        hydrate(&self.pool, rows).await
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Product>> {
        let condition = "($1 OR p.is_active) AND ($2::uuid IS NULL OR EXISTS (\
             SELECT 1 FROM product_categories pc \
             WHERE pc.product_id = p.id AND pc.category_id = $2))";
        let category_id = filter.category_id.map(|c| c.as_uuid());

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products p WHERE {condition}"
        ))
        .bind(filter.include_inactive)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN inventories i ON i.product_id = p.id \
             WHERE {condition} ORDER BY p.name ASC, p.id ASC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.include_inactive)
        .bind(category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items: hydrate(&self.pool, rows).await?,
            page: page.page(),
            per_page: page.per_page(),
            total: total(count),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i64,
    ) -> RepositoryResult<Option<Inventory>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE inventories
            SET on_hand = on_hand + $2, updated_at = NOW()
            WHERE product_id = $1 AND on_hand + $2 >= reserved AND on_hand + $2 >= 0
            RETURNING on_hand, reserved
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(|(on_hand, reserved)| inventory_from(on_hand, reserved))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn set_stock(&self, id: ProductId, on_hand: i64) -> RepositoryResult<Option<Inventory>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE inventories
            SET on_hand = $2, updated_at = NOW()
            WHERE product_id = $1 AND $2 >= reserved
            RETURNING on_hand, reserved
            "#,
        )
        .bind(id.as_uuid())
        .bind(on_hand)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(|(on_hand, reserved)| inventory_from(on_hand, reserved))
            .transpose()
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<bool> {
        let reserved = sqlx::query(
            r#"
            UPDATE inventories
            SET reserved = reserved + $2, updated_at = NOW()
            WHERE product_id = $1 AND on_hand - reserved >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if reserved.rows_affected() > 0 {
            return Ok(true);
        }
        self.ensure_inventory(id).await?;
        Ok(false)
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()> {
        let released = sqlx::query(
            r#"
            UPDATE inventories
            SET reserved = reserved - $2, updated_at = NOW()
            WHERE product_id = $1 AND reserved >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if released.rows_affected() == 0 {
            self.ensure_inventory(id).await?;
            return Err(RepositoryError::Conflict(format!(
                "requested {quantity} exceeds reserved stock of product {id}"
            )));
        }
        Ok(())
    }

    async fn commit_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()> {
        let committed = sqlx::query(
            r#"
            UPDATE inventories
            SET reserved = reserved - $2, on_hand = on_hand - $2, updated_at = NOW()
            WHERE product_id = $1 AND reserved >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if committed.rows_affected() == 0 {
            self.ensure_inventory(id).await?;
            return Err(RepositoryError::Conflict(format!(
                "requested {quantity} exceeds reserved stock of product {id}"
            )));
        }
        Ok(())
    }

    async fn restore_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()> {
        let restored = sqlx::query(
            r#"
            UPDATE inventories
            SET reserved = reserved + $2, on_hand = on_hand + $2, updated_at = NOW()
            WHERE product_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if restored.rows_affected() == 0 {
            self.ensure_inventory(id).await?;
        }
        Ok(())
    }
}

impl PostgresStore {
    /// Fails with a backend error if the product has no inventory row.
    async fn ensure_inventory(&self, id: ProductId) -> RepositoryResult<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM inventories WHERE product_id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        if exists {
            Ok(())
        } else {
            Err(RepositoryError::Backend(format!("product {id} does not exist")))
        }
    }
}
