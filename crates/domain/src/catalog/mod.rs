//! Categories, products, images and stock.

mod category;
mod inventory;
mod product;
mod service;

use thiserror::Error;

pub use category::{Category, CategoryInput};
pub use inventory::Inventory;
pub use product::{ImageInput, MAX_PRICE, NewProduct, Product, ProductImage, ProductUpdate};
pub use service::CatalogService;

/// Errors raised when a stock change would break the inventory invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("stock cannot be negative")]
    NegativeStock,

    #[error("on-hand stock {on_hand} would fall below reserved stock {reserved}")]
    BelowReserved { on_hand: i64, reserved: i64 },

    #[error("insufficient stock: requested {requested}, available {available}")]
    Insufficient { requested: i64, available: i64 },

    #[error("requested {requested} exceeds reserved stock {reserved}")]
    ExceedsReserved { requested: i64, reserved: i64 },
}
