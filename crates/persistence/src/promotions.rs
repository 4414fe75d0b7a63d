use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, CouponId, Money, ProductId, SaleId, ShippingMethodId};
use domain::ordering::{Coupon, CouponCode, DateWindow, ProductTargets, Sale, ShippingMethod};
use domain::ports::{CouponRepository, SaleRepository, ShippingMethodRepository};
use domain::{Page, PageRequest, RepositoryError, RepositoryResult};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::{corrupt, db_error};
use crate::store::{PostgresStore, limit_offset, percentage, total, unsigned};

const SALE_COLUMNS: &str =
    "id, name, percentage, starts_at, ends_at, is_active, created_at, updated_at";

const COUPON_COLUMNS: &str = "id, code, percentage, starts_at, ends_at, is_active, usage_limit, \
     times_used, min_order_amount_cents, created_at, updated_at";

const SHIPPING_METHOD_COLUMNS: &str =
    "id, name, price_cents, estimated_days, is_active, created_at, updated_at";

/// Target table of a promotion: `(table, owner column)`.
#[derive(Clone, Copy)]
struct TargetTable {
    table: &'static str,
    owner: &'static str,
}

const SALE_TARGETS: TargetTable = TargetTable {
    table: "sale_targets",
    owner: "sale_id",
};

const COUPON_TARGETS: TargetTable = TargetTable {
    table: "coupon_targets",
    owner: "coupon_id",
};

async fn load_targets(
    pool: &PgPool,
    targets: TargetTable,
    owners: &[Uuid],
) -> RepositoryResult<HashMap<Uuid, ProductTargets>> {
    let mut loaded: HashMap<Uuid, ProductTargets> = HashMap::new();
    if owners.is_empty() {
        return Ok(loaded);
    }
    let rows = sqlx::query(&format!(
        "SELECT {owner} AS owner_id, kind, target_id, excluded FROM {table} WHERE {owner} = ANY($1)",
        owner = targets.owner,
        table = targets.table,
    ))
    .bind(owners)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    for row in rows {
        let owner: Uuid = row.try_get("owner_id").map_err(db_error)?;
        let kind: String = row.try_get("kind").map_err(db_error)?;
        let target: Uuid = row.try_get("target_id").map_err(db_error)?;
        let excluded: bool = row.try_get("excluded").map_err(db_error)?;
        let entry = loaded.entry(owner).or_default();
        match (kind.as_str(), excluded) {
            ("category", false) => {
                entry.included_categories.insert(CategoryId::from_uuid(target));
            }
            ("category", true) => {
                entry.excluded_categories.insert(CategoryId::from_uuid(target));
            }
            ("product", false) => {
                entry.included_products.insert(ProductId::from_uuid(target));
            }
            ("product", true) => {
                entry.excluded_products.insert(ProductId::from_uuid(target));
            }
            _ => return Err(corrupt("target kind", &kind)),
        }
    }
    Ok(loaded)
}

async fn write_targets(
    conn: &mut PgConnection,
    targets: TargetTable,
    owner: Uuid,
    value: &ProductTargets,
) -> RepositoryResult<()> {
    sqlx::query(&format!(
        "DELETE FROM {table} WHERE {owner} = $1",
        table = targets.table,
        owner = targets.owner,
    ))
    .bind(owner)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    let categories = value
        .included_categories
        .iter()
        .map(|c| ("category", c.as_uuid(), false))
        .chain(
            value
                .excluded_categories
                .iter()
                .map(|c| ("category", c.as_uuid(), true)),
        );
    let products = value
        .included_products
        .iter()
        .map(|p| ("product", p.as_uuid(), false))
        .chain(
            value
                .excluded_products
                .iter()
                .map(|p| ("product", p.as_uuid(), true)),
        );

    let insert = format!(
        "INSERT INTO {table} ({owner}, kind, target_id, excluded) VALUES ($1, $2, $3, $4)",
        table = targets.table,
        owner = targets.owner,
    );
    for (kind, target, excluded) in categories.chain(products) {
        sqlx::query(&insert)
            .bind(owner)
            .bind(kind)
            .bind(target)
            .bind(excluded)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }
    Ok(())
}

fn window(row: &PgRow) -> RepositoryResult<DateWindow> {
    let starts_at: DateTime<Utc> = row.try_get("starts_at").map_err(db_error)?;
    let ends_at: DateTime<Utc> = row.try_get("ends_at").map_err(db_error)?;
    DateWindow::new(starts_at, ends_at).map_err(|e| corrupt("promotion window", e))
}

fn row_to_sale(row: &PgRow) -> RepositoryResult<Sale> {
    Ok(Sale {
        id: SaleId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        percentage: percentage(row.try_get("percentage").map_err(db_error)?)?,
        window: window(row)?,
        is_active: row.try_get("is_active").map_err(db_error)?,
        targets: ProductTargets::default(),
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn row_to_coupon(row: &PgRow) -> RepositoryResult<Coupon> {
    let code: String = row.try_get("code").map_err(db_error)?;
    Ok(Coupon {
        id: CouponId::from_uuid(row.try_get("id").map_err(db_error)?),
        code: CouponCode::parse(&code).map_err(|e| corrupt("coupon code", e))?,
        percentage: percentage(row.try_get("percentage").map_err(db_error)?)?,
        window: window(row)?,
        is_active: row.try_get("is_active").map_err(db_error)?,
        usage_limit: row
            .try_get::<Option<i64>, _>("usage_limit")
            .map_err(db_error)?
            .map(|limit| unsigned("usage limit", limit))
            .transpose()?,
        times_used: unsigned("times used", row.try_get("times_used").map_err(db_error)?)?,
        min_order_amount: row
            .try_get::<Option<i64>, _>("min_order_amount_cents")
            .map_err(db_error)?
            .map(Money::from_cents),
        targets: ProductTargets::default(),
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn row_to_shipping_method(row: &PgRow) -> RepositoryResult<ShippingMethod> {
    let estimated_days: i32 = row.try_get("estimated_days").map_err(db_error)?;
    Ok(ShippingMethod {
        id: ShippingMethodId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        price: Money::from_cents(row.try_get("price_cents").map_err(db_error)?),
        estimated_days: unsigned("estimated days", i64::from(estimated_days))?,
        is_active: row.try_get("is_active").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

async fn hydrate_sales(pool: &PgPool, rows: Vec<PgRow>) -> RepositoryResult<Vec<Sale>> {
    let mut sales = rows.iter().map(row_to_sale).collect::<RepositoryResult<Vec<_>>>()?;
    let ids: Vec<Uuid> = sales.iter().map(|s| s.id.as_uuid()).collect();
    let mut targets = load_targets(pool, SALE_TARGETS, &ids).await?;
    for sale in &mut sales {
        sale.targets = targets.remove(&sale.id.as_uuid()).unwrap_or_default();
    }
    Ok(sales)
}

async fn hydrate_coupons(pool: &PgPool, rows: Vec<PgRow>) -> RepositoryResult<Vec<Coupon>> {
    let mut coupons = rows
        .iter()
        .map(row_to_coupon)
        .collect::<RepositoryResult<Vec<_>>>()?;
    let ids: Vec<Uuid> = coupons.iter().map(|c| c.id.as_uuid()).collect();
    let mut targets = load_targets(pool, COUPON_TARGETS, &ids).await?;
    for coupon in &mut coupons {
        coupon.targets = targets.remove(&coupon.id.as_uuid()).unwrap_or_default();
    }
    Ok(coupons)
}

fn optional_cents(amount: Option<Money>) -> Option<i64> {
    amount.map(|m| m.cents())
}

#[async_trait]
impl SaleRepository for PostgresStore {
    #[tracing::instrument(skip(self, sale), fields(sale_id = %sale.id))]
    async fn insert_sale(&self, sale: &Sale) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO sales (id, name, percentage, starts_at, ends_at, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(&sale.name)
        .bind(i16::from(sale.percentage.value()))
        .bind(sale.window.starts_at())
        .bind(sale.window.ends_at())
        .bind(sale.is_active)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_targets(&mut tx, SALE_TARGETS, sale.id.as_uuid(), &sale.targets).await?;
        tx.commit().await.map_err(db_error)
    }

    #[tracing::instrument(skip(self, sale), fields(sale_id = %sale.id))]
    async fn save_sale(&self, sale: &Sale) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            r#"
            UPDATE sales
            SET name = $2, percentage = $3, starts_at = $4, ends_at = $5, is_active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(&sale.name)
        .bind(i16::from(sale.percentage.value()))
        .bind(sale.window.starts_at())
        .bind(sale.window.ends_at())
        .bind(sale.is_active)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "sale {} does not exist",
                sale.id
            )));
        }

        write_targets(&mut tx, SALE_TARGETS, sale.id.as_uuid(), &sale.targets).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_sale(&self, id: SaleId) -> RepositoryResult<Option<Sale>> {
        let rows = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(hydrate_sales(&self.pool, rows).await?.pop())
    }

    async fn list_sales(&self, page: PageRequest) -> RepositoryResult<Page<Sale>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items: hydrate_sales(&self.pool, rows).await?,
            page: page.page(),
            per_page: page.per_page(),
            total: total(count),
        })
    }

    async fn running_sales(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Sale>> {
        let rows = sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE is_active AND starts_at <= $1 AND ends_at >= $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        hydrate_sales(&self.pool, rows).await
    }
}

#[async_trait]
impl CouponRepository for PostgresStore {
    #[tracing::instrument(skip(self, coupon), fields(coupon_id = %coupon.id))]
    async fn insert_coupon(&self, coupon: &Coupon) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, percentage, starts_at, ends_at, is_active, usage_limit,
                                 times_used, min_order_amount_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(coupon.code.as_str())
        .bind(i16::from(coupon.percentage.value()))
        .bind(coupon.window.starts_at())
        .bind(coupon.window.ends_at())
        .bind(coupon.is_active)
        .bind(coupon.usage_limit.map(i64::from))
        .bind(i64::from(coupon.times_used))
        .bind(optional_cents(coupon.min_order_amount))
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_targets(&mut tx, COUPON_TARGETS, coupon.id.as_uuid(), &coupon.targets).await?;
        tx.commit().await.map_err(db_error)
    }

    #[tracing::instrument(skip(self, coupon), fields(coupon_id = %coupon.id))]
    async fn save_coupon(&self, coupon: &Coupon) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            r#"
            UPDATE coupons
            SET code = $2, percentage = $3, starts_at = $4, ends_at = $5, is_active = $6,
                usage_limit = $7, min_order_amount_cents = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(coupon.code.as_str())
        .bind(i16::from(coupon.percentage.value()))
        .bind(coupon.window.starts_at())
        .bind(coupon.window.ends_at())
        .bind(coupon.is_active)
        .bind(coupon.usage_limit.map(i64::from))
        .bind(optional_cents(coupon.min_order_amount))
        .bind(coupon.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "coupon {} does not exist",
                coupon.id
            )));
        }

        write_targets(&mut tx, COUPON_TARGETS, coupon.id.as_uuid(), &coupon.targets).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_coupon(&self, id: CouponId) -> RepositoryResult<Option<Coupon>> {
        let rows = sqlx::query(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(hydrate_coupons(&self.pool, rows).await?.pop())
    }

    async fn find_coupon_by_code(&self, code: &CouponCode) -> RepositoryResult<Option<Coupon>> {
        let rows = sqlx::query(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(hydrate_coupons(&self.pool, rows).await?.pop())
    }

    async fn list_coupons(&self, page: PageRequest) -> RepositoryResult<Page<Coupon>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupons")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY code ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items: hydrate_coupons(&self.pool, rows).await?,
            page: page.page(),
            per_page: page.per_page(),
            total: total(count),
        })
    }

    async fn redeem_coupon(&self, id: CouponId) -> RepositoryResult<bool> {
        let redeemed = sqlx::query(
            r#"
            UPDATE coupons
            SET times_used = times_used + 1
            WHERE id = $1 AND (usage_limit IS NULL OR times_used < usage_limit)
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if redeemed.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM coupons WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        if exists {
            Ok(false)
        } else {
            Err(RepositoryError::Backend(format!("coupon {id} does not exist")))
        }
    }

    async fn unredeem_coupon(&self, id: CouponId) -> RepositoryResult<()> {
        let updated = sqlx::query(
            "UPDATE coupons SET times_used = GREATEST(times_used - 1, 0) WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!("coupon {id} does not exist")));
        }
        Ok(())
    }
}

#[async_trait]
impl ShippingMethodRepository for PostgresStore {
    async fn insert_shipping_method(&self, method: &ShippingMethod) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shipping_methods (id, name, price_cents, estimated_days, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(method.id.as_uuid())
        .bind(&method.name)
        .bind(method.price.cents())
        .bind(i32::try_from(method.estimated_days).unwrap_or(i32::MAX))
        .bind(method.is_active)
        .bind(method.created_at)
        .bind(method.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn save_shipping_method(&self, method: &ShippingMethod) -> RepositoryResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE shipping_methods
            SET name = $2, price_cents = $3, estimated_days = $4, is_active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(method.id.as_uuid())
        .bind(&method.name)
        .bind(method.price.cents())
        .bind(i32::try_from(method.estimated_days).unwrap_or(i32::MAX))
        .bind(method.is_active)
        .bind(method.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "shipping method {} does not exist",
                method.id
            )));
        }
        Ok(())
    }

    async fn find_shipping_method(
        &self,
        id: ShippingMethodId,
    ) -> RepositoryResult<Option<ShippingMethod>> {
        sqlx::query(&format!(
            "SELECT {SHIPPING_METHOD_COLUMNS} FROM shipping_methods WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .as_ref()
        .map(row_to_shipping_method)
        .transpose()
    }

    async fn list_shipping_methods(
        &self,
        include_inactive: bool,
    ) -> RepositoryResult<Vec<ShippingMethod>> {
        sqlx::query(&format!(
            "SELECT {SHIPPING_METHOD_COLUMNS} FROM shipping_methods \
             WHERE $1 OR is_active ORDER BY price_cents ASC, name ASC"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_shipping_method)
        .collect()
    }
}
