//! Checkout coordinator for placing orders and driving their lifecycle.

use std::sync::Arc;

use chrono::Utc;
use common::{CouponId, OrderId, ProductId, UserId};
use domain::identity::access::require_admin;
use domain::ordering::{OrderRequest, Payment, PaymentMethod, PricedOrder};
use domain::{DomainError, Order, OrderService, RepositoryError, Store, User};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{CheckoutError, Result};
use crate::gateway::PaymentGateway;

/// Checkout steps, used when logging compensation.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";
pub const STEP_REDEEM_COUPONS: &str = "redeem_coupons";
pub const STEP_AUTHORIZE_PAYMENT: &str = "authorize_payment";
pub const STEP_PERSIST_ORDER: &str = "persist_order";
pub const STEP_RELEASE_STOCK: &str = "release_stock";
pub const STEP_COMMIT_STOCK: &str = "commit_stock";

/// A customer's request to buy.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    #[serde(flatten)]
    pub request: OrderRequest,
    pub payment_method: PaymentMethod,
}

/// An admin's request to hand an order to a carrier.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipOrder {
    pub carrier_id: UserId,
    /// Generated when omitted.
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Side effects applied so far by a checkout, undone in reverse on failure.
#[derive(Debug, Default)]
struct Applied {
    reserved: Vec<(ProductId, u32)>,
    redeemed: Vec<CouponId>,
    authorization: Option<String>,
}

/// What happens to an order's reserved stock when it leaves `Placed`.
#[derive(Debug, Clone, Copy)]
enum StockMove {
    Release,
    Commit,
}

impl StockMove {
    fn step(self) -> &'static str {
        match self {
            StockMove::Release => STEP_RELEASE_STOCK,
            StockMove::Commit => STEP_COMMIT_STOCK,
        }
    }
}

/// Orchestrates order placement and the order lifecycle.
///
/// Placement reserves stock, redeems coupons and authorizes payment in that
/// order. If any step fails, the steps already completed are compensated in
/// reverse order and nothing is persisted.
///
/// Cancel and ship call the gateway first, then move stock, then save the
/// order. Gateway calls are idempotent, and a failure after them puts the
/// stock back and leaves the stored order untouched, so the request can be
/// retried.
pub struct CheckoutCoordinator<S, P>
where
    S: Store,
    P: PaymentGateway,
{
    store: S,
    orders: OrderService<S>,
    gateway: P,
    /// Serializes cancel, ship and deliver so a stock release or capture is
    /// applied once per order.
    transitions: Arc<Mutex<()>>,
}

impl<S, P> Clone for CheckoutCoordinator<S, P>
where
    S: Store,
    P: PaymentGateway + Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            orders: self.orders.clone(),
            gateway: self.gateway.clone(),
            transitions: Arc::clone(&self.transitions),
        }
    }
}

impl<S, P> CheckoutCoordinator<S, P>
where
    S: Store,
    P: PaymentGateway,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, gateway: P) -> Self {
        let orders = OrderService::new(store.clone());
        Self {
            store,
            orders,
            gateway,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    /// Places an order for `user`.
    #[tracing::instrument(skip(self, user, command), fields(user_id = %user.id))]
    pub async fn place_order(&self, user: &User, command: PlaceOrder) -> Result<Order> {
        let started = std::time::Instant::now();
        let result = self.try_place_order(user, command).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.pricing.total,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_placement_failures_total", "reason" => e.reason())
                    .increment(1);
                tracing::warn!(reason = e.reason(), error = %e, "order placement failed");
            }
        }
        result
    }

    async fn try_place_order(&self, user: &User, command: PlaceOrder) -> Result<Order> {
        let priced = self.orders.quote(user, &command.request).await?;
        let order_id = OrderId::new();
        let mut applied = Applied::default();

        if let Err(e) = self.apply_steps(order_id, &priced, command.payment_method, &mut applied).await {
            self.compensate(&applied).await;
            return Err(e);
        }

        let reference = applied.authorization.clone().unwrap_or_default();
        let now = Utc::now();
        let payment = Payment::authorized(
            priced.pricing.total,
            command.payment_method,
            reference,
            now,
        );
        let order = Order::place(order_id, priced, payment, now);

        if let Err(e) = self.store.insert_order(&order).await {
            tracing::error!(%order_id, step = STEP_PERSIST_ORDER, error = %e, "checkout step failed");
            self.compensate(&applied).await;
            return Err(e.into());
        }
        Ok(order)
    }

    async fn apply_steps(
        &self,
        order_id: OrderId,
        priced: &PricedOrder,
        method: PaymentMethod,
        applied: &mut Applied,
    ) -> Result<()> {
        tracing::debug!(step = STEP_RESERVE_STOCK, "checkout step started");
        for item in &priced.line_items {
            if !self
                .store
                .reserve_stock(item.product_id, item.quantity)
                .await?
            {
                return Err(CheckoutError::InsufficientStock {
                    product_id: item.product_id,
                });
            }
            applied.reserved.push((item.product_id, item.quantity));
        }

        tracing::debug!(step = STEP_REDEEM_COUPONS, "checkout step started");
        for (coupon_id, code) in &priced.coupons {
            if !self.store.redeem_coupon(*coupon_id).await? {
                return Err(CheckoutError::CouponUnavailable {
                    code: code.to_string(),
                });
            }
            applied.redeemed.push(*coupon_id);
        }

        tracing::debug!(step = STEP_AUTHORIZE_PAYMENT, "checkout step started");
        let authorization = self
            .gateway
            .authorize(order_id, priced.pricing.total, method)
            .await?;
        applied.authorization = Some(authorization.reference);
        Ok(())
    }

    /// Undoes applied steps in reverse order. Failures are logged and the
    /// remaining steps still run.
    #[tracing::instrument(skip(self, applied))]
    async fn compensate(&self, applied: &Applied) {
        if let Some(reference) = &applied.authorization
            && let Err(e) = self.gateway.void(reference).await
        {
            tracing::error!(step = STEP_AUTHORIZE_PAYMENT, error = %e, "compensation step failed");
        }
        for coupon_id in applied.redeemed.iter().rev() {
            if let Err(e) = self.store.unredeem_coupon(*coupon_id).await {
                tracing::error!(step = STEP_REDEEM_COUPONS, %coupon_id, error = %e, "compensation step failed");
            }
        }
        for (product_id, quantity) in applied.reserved.iter().rev() {
            if let Err(e) = self.store.release_stock(*product_id, *quantity).await {
                tracing::error!(step = STEP_RESERVE_STOCK, %product_id, error = %e, "compensation step failed");
            }
        }
    }

    /// Cancels a placed order on behalf of its owner or an admin.
    ///
    /// The payment is voided and reserved stock released. Coupon redemptions
    /// are kept.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn cancel_order(
        &self,
        requester: &User,
        id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        let _guard = self.transitions.lock().await;
        let mut order = self.orders.get_order_for(requester, id).await?;
        order
            .cancel(reason, Utc::now())
            .map_err(DomainError::from)?;

        self.gateway.void(&order.payment.gateway_reference).await?;
        self.finish_transition(&order, StockMove::Release).await?;

        tracing::info!(order_id = %id, "order cancelled");
        Ok(order)
    }

    /// Ships a placed order. Admin only.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn ship_order(&self, requester: &User, id: OrderId, command: ShipOrder) -> Result<Order> {
        require_admin(requester)?;
        let carrier = self
            .store
            .find_user(command.carrier_id)
            .await?
            .filter(|c| c.is_active && c.is_carrier())
            .ok_or_else(|| DomainError::invalid("carrier_id", "not an active carrier"))?;
        let tracking_number = match command.tracking_number.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => generate_tracking_number(),
        };

        let _guard = self.transitions.lock().await;
        let mut order = self.orders.find_order(id).await?;
        order
            .ship(carrier.id, tracking_number, Utc::now())
            .map_err(DomainError::from)?;

        self.gateway.capture(&order.payment.gateway_reference).await?;
        self.finish_transition(&order, StockMove::Commit).await?;

        tracing::info!(order_id = %id, carrier_id = %carrier.id, "order shipped");
        Ok(order)
    }

    /// Moves the stock of every line and saves `order`. On failure the lines
    /// already moved are put back.
    async fn finish_transition(&self, order: &Order, stock_move: StockMove) -> Result<()> {
        let mut moved = Vec::with_capacity(order.line_items.len());
        let result = self.move_stock_and_save(order, stock_move, &mut moved).await;
        if let Err(e) = &result {
            tracing::error!(order_id = %order.id, error = %e, "order transition failed");
            self.undo_stock_moves(stock_move, &moved).await;
        }
        result
    }

    async fn move_stock_and_save(
        &self,
        order: &Order,
        stock_move: StockMove,
        moved: &mut Vec<(ProductId, u32)>,
    ) -> Result<()> {
        for item in &order.line_items {
            match stock_move {
                StockMove::Release => {
                    self.store
                        .release_stock(item.product_id, item.quantity)
                        .await?
                }
                StockMove::Commit => {
                    self.store
                        .commit_stock(item.product_id, item.quantity)
                        .await?
                }
            }
            moved.push((item.product_id, item.quantity));
        }
        self.store.save_order(order).await?;
        Ok(())
    }

    /// Failures are logged and the remaining lines still run.
    async fn undo_stock_moves(&self, stock_move: StockMove, moved: &[(ProductId, u32)]) {
        for (product_id, quantity) in moved.iter().rev() {
            let undone = match stock_move {
                StockMove::Release => match self.store.reserve_stock(*product_id, *quantity).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(RepositoryError::Conflict(format!(
                        "released stock of product {product_id} was reserved by another order"
                    ))),
                    Err(e) => Err(e),
                },
                StockMove::Commit => self.store.restore_stock(*product_id, *quantity).await,
            };
            if let Err(e) = undone {
                tracing::error!(step = stock_move.step(), %product_id, error = %e, "compensation step failed");
            }
        }
    }

    /// Marks a shipped order delivered. Allowed for the assigned carrier or
    /// an admin.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn deliver_order(&self, requester: &User, id: OrderId) -> Result<Order> {
        let _guard = self.transitions.lock().await;
        let mut order = self.orders.find_order(id).await?;
        let assigned = requester.is_carrier() && order.shipment.carrier_id == Some(requester.id);
        if !assigned && !requester.is_admin() {
            return Err(DomainError::Forbidden(
                "only the assigned carrier can deliver this order".to_string(),
            )
            .into());
        }

        order.deliver(Utc::now()).map_err(DomainError::from)?;
        self.store.save_order(&order).await?;

        tracing::info!(order_id = %id, "order delivered");
        Ok(order)
    }
}

/// `TRK-` followed by 10 uppercase hex characters.
fn generate_tracking_number() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TRK-{}", &hex[..10])
}
