//! Order aggregate.

use chrono::{DateTime, Utc};
use common::{CouponId, Money, OrderId, ProductId, ShippingMethodId, UserId};
use serde::{Deserialize, Serialize};

use super::{CouponCode, OrderError, OrderPricing, OrderStatus, Payment, Shipment};
use crate::identity::Address;

/// A purchased product with its price at the time of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub purchased_price: Money,
    pub quantity: u32,
}

impl LineItem {
    pub fn total(&self) -> Money {
        self.purchased_price.multiply(self.quantity)
    }
}

/// One entry of an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Everything an order is built from once it has been priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub user_id: UserId,
    pub line_items: Vec<LineItem>,
    pub coupons: Vec<(CouponId, CouponCode)>,
    pub shipping_method_id: ShippingMethodId,
    pub shipping_address: Address,
    pub pricing: OrderPricing,
}

/// Order aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,
    pub coupon_ids: Vec<CouponId>,
    pub coupon_codes: Vec<CouponCode>,
    pub shipping_method_id: ShippingMethodId,
    /// Copy of the address at placement time.
    pub shipping_address: Address,
    pub pricing: OrderPricing,
    pub payment: Payment,
    pub shipment: Shipment,
    /// Oldest first; starts with the `Placed` entry.
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a placed order with an authorized payment and a pending
    /// shipment.
    pub fn place(id: OrderId, priced: PricedOrder, payment: Payment, now: DateTime<Utc>) -> Self {
        let (coupon_ids, coupon_codes) = priced.coupons.into_iter().unzip();
        Self {
            id,
            user_id: priced.user_id,
            status: OrderStatus::Placed,
            line_items: priced.line_items,
            coupon_ids,
            coupon_codes,
            shipping_method_id: priced.shipping_method_id,
            shipping_address: priced.shipping_address,
            pricing: priced.pricing,
            payment,
            shipment: Shipment::pending(),
            status_history: vec![StatusChange {
                status: OrderStatus::Placed,
                note: None,
                at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.line_items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Cancels a placed order and voids its payment.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure(self.status.can_cancel(), "cancel")?;
        self.payment.void(now)?;
        self.record(OrderStatus::Cancelled, reason, now);
        Ok(())
    }

    /// Ships a placed order: captures the payment and dispatches the
    /// shipment with the carrier.
    pub fn ship(
        &mut self,
        carrier_id: UserId,
        tracking_number: String,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure(self.status.can_ship(), "ship")?;
        let mut payment = self.payment.clone();
        let mut shipment = self.shipment.clone();
        payment.capture(now)?;
        shipment.dispatch(carrier_id, tracking_number, now)?;
        self.payment = payment;
        self.shipment = shipment;
        self.record(OrderStatus::Shipped, None, now);
        Ok(())
    }

    /// Marks a shipped order as delivered.
    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure(self.status.can_deliver(), "deliver")?;
        self.shipment.deliver(now)?;
        self.record(OrderStatus::Delivered, None, now);
        Ok(())
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                status: self.status,
                action,
            })
        }
    }

    fn record(&mut self, status: OrderStatus, note: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            note,
            at: now,
        });
        self.updated_at = now;
    }
}
