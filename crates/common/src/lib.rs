//! Shared types used by every layer of the shop backend.

pub mod money;
pub mod types;

pub use money::{Money, Percentage, PercentageError};
pub use types::{
    AddressId, CategoryId, CouponId, ImageId, OrderId, PaymentId, ProductId, SaleId,
    ShipmentId, ShippingMethodId, UserId,
};
