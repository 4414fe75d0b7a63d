//! Domain layer of the shop backend.
//!
//! This crate provides:
//! - Identity: users, roles, addresses, password hashing, authentication
//! - Catalog: categories, products, images and inventory
//! - Ordering: orders, payments, shipments, sales, coupons, shipping methods
//! - The pricing engine
//! - Repository ports and an in-memory implementation of them

pub mod catalog;
pub mod error;
pub mod identity;
pub mod memory;
pub mod ordering;
pub mod pagination;
pub mod ports;

pub use catalog::{CatalogService, Category, Inventory, InventoryError, Product};
pub use error::{DomainError, Result, ValidationErrors};
pub use identity::{Email, IdentityService, Role, User};
pub use memory::InMemoryStore;
pub use ordering::{
    Coupon, Order, OrderError, OrderRequest, OrderService, OrderStatus, PricedOrder,
    PromotionService, Sale, ShippingMethod,
};
pub use pagination::{Page, PageRequest};
pub use ports::{RepositoryError, RepositoryResult, Store};
