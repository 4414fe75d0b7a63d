//! Order placement with compensation.
//!
//! Placing an order follows these steps:
//! 1. Validate and price the request
//! 2. Reserve stock for every line
//! 3. Redeem the applied coupons
//! 4. Authorize payment
//! 5. Persist the order
//!
//! If any step fails, previously completed steps are compensated in reverse order.

pub mod coordinator;
pub mod error;
pub mod gateway;

pub use coordinator::{CheckoutCoordinator, PlaceOrder, ShipOrder};
pub use error::CheckoutError;
pub use gateway::{Authorization, InMemoryPaymentGateway, PaymentGateway};
