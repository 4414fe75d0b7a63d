//! Orders, payments, shipments, shipping methods, sales, coupons and
//! pricing.

mod coupon;
mod order;
mod payment;
pub mod pricing;
mod service;
mod shipment;
mod shipping_method;
mod sale;
mod state;
mod targets;
mod window;

use thiserror::Error;

pub use coupon::{Coupon, CouponCode, CouponInput, InvalidCouponCode};
pub use order::{LineItem, Order, PricedOrder, StatusChange};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use pricing::{AppliedDiscount, DiscountKind, OrderPricing, PricingLine, price_order};
pub use sale::{Sale, SaleInput};
pub use service::{
    MAX_LINE_QUANTITY, OrderItemRequest, OrderRequest, OrderService, PromotionService,
};
pub use shipment::{Shipment, ShipmentStatus};
pub use shipping_method::{ShippingMethod, ShippingMethodInput};
pub use state::OrderStatus;
pub use targets::ProductTargets;
pub use window::DateWindow;

/// Errors that can occur when changing an order's state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("cannot {action} an order that is {status}")]
    InvalidTransition {
        status: OrderStatus,
        action: &'static str,
    },

    #[error("cannot {action} a payment that is {status}")]
    PaymentTransition {
        status: PaymentStatus,
        action: &'static str,
    },

    #[error("cannot {action} a shipment that is {status}")]
    ShipmentTransition {
        status: ShipmentStatus,
        action: &'static str,
    },
}
