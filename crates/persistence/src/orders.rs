use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    AddressId, CouponId, Money, OrderId, PaymentId, ProductId, ShipmentId, ShippingMethodId,
    UserId,
};
use domain::identity::Address;
use domain::ordering::{
    AppliedDiscount, CouponCode, DiscountKind, LineItem, Order, OrderPricing, OrderStatus,
    Payment, PaymentMethod, PaymentStatus, Shipment, ShipmentStatus, StatusChange,
};
use domain::ports::{OrderFilter, OrderRepository};
use domain::{Page, PageRequest, RepositoryError, RepositoryResult};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::{corrupt, db_error};
use crate::store::{PostgresStore, limit_offset, percentage, total, unsigned};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.status, o.shipping_method_id, \
     o.address_id, o.address_street, o.address_city, o.address_state, o.address_postal_code, \
     o.address_country, o.address_is_default, o.address_created_at, \
     o.subtotal_cents, o.discount_total_cents, o.shipping_cents, o.total_cents, \
     o.created_at, o.updated_at, \
     p.id AS payment_id, p.amount_cents AS payment_amount_cents, p.method AS payment_method, \
     p.status AS payment_status, p.gateway_reference, p.created_at AS payment_created_at, \
     p.updated_at AS payment_updated_at, \
     s.id AS shipment_id, s.carrier_id, s.tracking_number, s.status AS shipment_status, \
     s.shipped_at, s.delivered_at";

const ORDER_FROM: &str = "FROM orders o \
     JOIN payments p ON p.order_id = o.id \
     JOIN shipments s ON s.order_id = o.id";

/// Matches the `OrderFilter` binds `$1` (user) and `$2` (carrier).
const ORDER_FILTER: &str =
    "($1::uuid IS NULL OR o.user_id = $1) AND ($2::uuid IS NULL OR s.carrier_id = $2)";

fn parse_status<T>(what: &str, value: String, parse: fn(&str) -> Option<T>) -> RepositoryResult<T> {
    parse(&value).ok_or_else(|| corrupt(what, value))
}

fn row_to_order(row: &PgRow) -> RepositoryResult<Order> {
    let payment = Payment {
        id: PaymentId::from_uuid(row.try_get("payment_id").map_err(db_error)?),
        amount: Money::from_cents(row.try_get("payment_amount_cents").map_err(db_error)?),
        method: parse_status(
            "payment method",
            row.try_get("payment_method").map_err(db_error)?,
            PaymentMethod::parse,
        )?,
        status: parse_status(
            "payment status",
            row.try_get("payment_status").map_err(db_error)?,
            PaymentStatus::parse,
        )?,
        gateway_reference: row.try_get("gateway_reference").map_err(db_error)?,
        created_at: row.try_get("payment_created_at").map_err(db_error)?,
        updated_at: row.try_get("payment_updated_at").map_err(db_error)?,
    };

    let shipment = Shipment {
        id: ShipmentId::from_uuid(row.try_get("shipment_id").map_err(db_error)?),
        carrier_id: row
            .try_get::<Option<Uuid>, _>("carrier_id")
            .map_err(db_error)?
            .map(UserId::from_uuid),
        tracking_number: row.try_get("tracking_number").map_err(db_error)?,
        status: parse_status(
            "shipment status",
            row.try_get("shipment_status").map_err(db_error)?,
            ShipmentStatus::parse,
        )?,
        shipped_at: row.try_get("shipped_at").map_err(db_error)?,
        delivered_at: row.try_get("delivered_at").map_err(db_error)?,
    };

    let shipping_address = Address {
        id: AddressId::from_uuid(row.try_get("address_id").map_err(db_error)?),
        street: row.try_get("address_street").map_err(db_error)?,
        city: row.try_get("address_city").map_err(db_error)?,
        state: row.try_get("address_state").map_err(db_error)?,
        postal_code: row.try_get("address_postal_code").map_err(db_error)?,
        country: row.try_get("address_country").map_err(db_error)?,
        is_default: row.try_get("address_is_default").map_err(db_error)?,
        created_at: row.try_get("address_created_at").map_err(db_error)?,
    };

    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id").map_err(db_error)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(db_error)?),
        status: parse_status(
            "order status",
            row.try_get("status").map_err(db_error)?,
            OrderStatus::parse,
        )?,
        line_items: Vec::new(),
        coupon_ids: Vec::new(),
        coupon_codes: Vec::new(),
        shipping_method_id: ShippingMethodId::from_uuid(
            row.try_get("shipping_method_id").map_err(db_error)?,
        ),
        shipping_address,
        pricing: OrderPricing {
            subtotal: Money::from_cents(row.try_get("subtotal_cents").map_err(db_error)?),
            discount_total: Money::from_cents(
                row.try_get("discount_total_cents").map_err(db_error)?,
            ),
            shipping: Money::from_cents(row.try_get("shipping_cents").map_err(db_error)?),
            total: Money::from_cents(row.try_get("total_cents").map_err(db_error)?),
            discounts: Vec::new(),
        },
        payment,
        shipment,
        status_history: Vec::new(),
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

/// Loads line items, coupons, discounts and status history for the given
/// order rows.
async fn hydrate(pool: &PgPool, rows: Vec<PgRow>) -> RepositoryResult<Vec<Order>> {
    let mut orders = rows.iter().map(row_to_order).collect::<RepositoryResult<Vec<_>>>()?;
    if orders.is_empty() {
        return Ok(orders);
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();

    let mut line_items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for row in sqlx::query(
        r#"
        SELECT order_id, product_id, product_name, purchased_price_cents, quantity
        FROM order_line_items
        WHERE order_id = ANY($1)
        ORDER BY position ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let order_id: Uuid = row.try_get("order_id").map_err(db_error)?;
        let quantity: i32 = row.try_get("quantity").map_err(db_error)?;
        line_items.entry(order_id).or_default().push(LineItem {
            product_id: ProductId::from_uuid(row.try_get("product_id").map_err(db_error)?),
            product_name: row.try_get("product_name").map_err(db_error)?,
            purchased_price: Money::from_cents(
                row.try_get("purchased_price_cents").map_err(db_error)?,
            ),
            quantity: unsigned("quantity", i64::from(quantity))?,
        });
    }

    let mut coupons: HashMap<Uuid, Vec<(CouponId, CouponCode)>> = HashMap::new();
    for row in sqlx::query(
        "SELECT order_id, coupon_id, code FROM order_coupons WHERE order_id = ANY($1) ORDER BY position ASC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let order_id: Uuid = row.try_get("order_id").map_err(db_error)?;
        let code: String = row.try_get("code").map_err(db_error)?;
        coupons.entry(order_id).or_default().push((
            CouponId::from_uuid(row.try_get("coupon_id").map_err(db_error)?),
            CouponCode::parse(&code).map_err(|e| corrupt("coupon code", e))?,
        ));
    }

    let mut discounts: HashMap<Uuid, Vec<AppliedDiscount>> = HashMap::new();
    for row in sqlx::query(
        r#"
        SELECT order_id, kind, source_id, label, percentage, amount_cents
        FROM order_discounts
        WHERE order_id = ANY($1)
        ORDER BY position ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let order_id: Uuid = row.try_get("order_id").map_err(db_error)?;
        discounts.entry(order_id).or_default().push(AppliedDiscount {
            kind: parse_status(
                "discount kind",
                row.try_get("kind").map_err(db_error)?,
                DiscountKind::parse,
            )?,
            source_id: row.try_get("source_id").map_err(db_error)?,
            label: row.try_get("label").map_err(db_error)?,
            percentage: percentage(row.try_get("percentage").map_err(db_error)?)?,
            amount: Money::from_cents(row.try_get("amount_cents").map_err(db_error)?),
        });
    }

    let mut history: HashMap<Uuid, Vec<StatusChange>> = HashMap::new();
    for row in sqlx::query(
        r#"
        SELECT order_id, status, note, at
        FROM order_status_history
        WHERE order_id = ANY($1)
        ORDER BY position ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?
    {
        let order_id: Uuid = row.try_get("order_id").map_err(db_error)?;
        history.entry(order_id).or_default().push(StatusChange {
            status: parse_status(
                "order status",
                row.try_get("status").map_err(db_error)?,
                OrderStatus::parse,
            )?,
            note: row.try_get("note").map_err(db_error)?,
            at: row.try_get("at").map_err(db_error)?,
        });
    }

    for order in &mut orders {
        let id = order.id.as_uuid();
        order.line_items = line_items.remove(&id).unwrap_or_default();
        (order.coupon_ids, order.coupon_codes) =
            coupons.remove(&id).unwrap_or_default().into_iter().unzip();
        order.pricing.discounts = discounts.remove(&id).unwrap_or_default();
        order.status_history = history.remove(&id).unwrap_or_default();
    }
    Ok(orders)
}

/// Replaces everything an order owns: payment, shipment, lines, coupons,
/// discounts and status history.
async fn write_children(conn: &mut PgConnection, order: &Order) -> RepositoryResult<()> {
    let id = order.id.as_uuid();
    for table in [
        "payments",
        "shipments",
        "order_line_items",
        "order_coupons",
        "order_discounts",
        "order_status_history",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE order_id = $1"))
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }

    let payment = &order.payment;
    sqlx::query(
        r#"
        INSERT INTO payments (id, order_id, amount_cents, method, status, gateway_reference, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(id)
    .bind(payment.amount.cents())
    .bind(payment.method.as_str())
    .bind(payment.status.as_str())
    .bind(&payment.gateway_reference)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    let shipment = &order.shipment;
    sqlx::query(
        r#"
        INSERT INTO shipments (id, order_id, carrier_id, tracking_number, status, shipped_at, delivered_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(shipment.id.as_uuid())
    .bind(id)
    .bind(shipment.carrier_id.map(|c| c.as_uuid()))
    .bind(&shipment.tracking_number)
    .bind(shipment.status.as_str())
    .bind(shipment.shipped_at)
    .bind(shipment.delivered_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    for (position, item) in (0_i32..).zip(&order.line_items) {
        sqlx::query(
            r#"
            INSERT INTO order_line_items (order_id, position, product_id, product_name, purchased_price_cents, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(position)
        .bind(item.product_id.as_uuid())
        .bind(&item.product_name)
        .bind(item.purchased_price.cents())
        .bind(i32::try_from(item.quantity).map_err(|_| corrupt("quantity", item.quantity))?)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }

    for (position, (coupon_id, code)) in
        (0_i32..).zip(order.coupon_ids.iter().zip(&order.coupon_codes))
    {
        sqlx::query(
            "INSERT INTO order_coupons (order_id, position, coupon_id, code) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(position)
        .bind(coupon_id.as_uuid())
        .bind(code.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }

    for (position, discount) in (0_i32..).zip(&order.pricing.discounts) {
        sqlx::query(
            r#"
            INSERT INTO order_discounts (order_id, position, kind, source_id, label, percentage, amount_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(position)
        .bind(discount.kind.as_str())
        .bind(discount.source_id)
        .bind(&discount.label)
        .bind(i16::from(discount.percentage.value()))
        .bind(discount.amount.cents())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }

    for (position, change) in (0_i32..).zip(&order.status_history) {
        sqlx::query(
            "INSERT INTO order_status_history (order_id, position, status, note, at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(position)
        .bind(change.status.as_str())
        .bind(&change.note)
        .bind(change.at)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert_order(&self, order: &Order) -> RepositoryResult<()> {
        let address = &order.shipping_address;
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status, shipping_method_id,
                address_id, address_street, address_city, address_state, address_postal_code,
                address_country, address_is_default, address_created_at,
                subtotal_cents, discount_total_cents, shipping_cents, total_cents,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.shipping_method_id.as_uuid())
        .bind(address.id.as_uuid())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(order.pricing.subtotal.cents())
        .bind(order.pricing.discount_total.cents())
        .bind(order.pricing.shipping.cents())
        .bind(order.pricing.total.cents())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_children(&mut tx, order).await?;
        tx.commit().await.map_err(db_error)
    }

    /// Line items, pricing and the address are fixed at placement; only the
    /// status and the owned payment, shipment and history change.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn save_order(&self, order: &Order) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id.as_uuid())
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "order {} does not exist",
                order.id
            )));
        }

        write_children(&mut tx, order).await?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_order(&self, id: OrderId) -> RepositoryResult<Option<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} {ORDER_FROM} WHERE o.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(hydrate(&self.pool, rows).await?.pop())
    }

    async fn list_orders(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Order>> {
        let user_id = filter.user_id.map(|u| u.as_uuid());
        let carrier_id = filter.carrier_id.map(|c| c.as_uuid());

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) {ORDER_FROM} WHERE {ORDER_FILTER}"
        ))
        .bind(user_id)
        .bind(carrier_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} {ORDER_FROM} WHERE {ORDER_FILTER} \
             ORDER BY o.created_at DESC, o.id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(carrier_id)
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
}
