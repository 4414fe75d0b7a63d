//! Repository ports implemented by the in-memory store and by PostgreSQL.
//!
//! Aggregates are saved whole: `save_*` replaces the root row and its owned
//! collections. Stock and coupon redemption counters are the exception; they
//! only change through the guarded operations on [`ProductRepository`] and
//! [`CouponRepository`] so concurrent checkouts cannot oversell.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, CouponId, OrderId, ProductId, SaleId, ShippingMethodId, UserId};
use thiserror::Error;

use crate::catalog::{Category, Inventory, Product};
use crate::identity::{Email, User};
use crate::ordering::{Coupon, CouponCode, Order, Sale, ShippingMethod};
use crate::pagination::{Page, PageRequest};

/// Errors reported by repository implementations.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// A uniqueness or integrity constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// Stored data could not be mapped back into a domain value.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// The backend failed (connection, query, migration).
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for repository operations.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Filter for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Only products linked to this category.
    pub category_id: Option<CategoryId>,
    /// Include deactivated products.
    pub include_inactive: bool,
}

/// Filter for order listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only orders placed by this user.
    pub user_id: Option<UserId>,
    /// Only orders whose shipment is assigned to this carrier.
    pub carrier_id: Option<UserId>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user. Fails with `Conflict` if the email is taken.
    async fn insert_user(&self, user: &User) -> RepositoryResult<()>;

    /// Replaces a user with its addresses and roles.
    async fn save_user(&self, user: &User) -> RepositoryResult<()>;

    async fn find_user(&self, id: UserId) -> RepositoryResult<Option<User>>;

    async fn find_user_by_email(&self, email: &Email) -> RepositoryResult<Option<User>>;

    /// Lists users ordered by creation time.
    async fn list_users(&self, page: PageRequest) -> RepositoryResult<Page<User>>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Inserts a category. Fails with `Conflict` if the name is taken.
    async fn insert_category(&self, category: &Category) -> RepositoryResult<()>;

    async fn save_category(&self, category: &Category) -> RepositoryResult<()>;

    async fn find_category(&self, id: CategoryId) -> RepositoryResult<Option<Category>>;

    /// Lists all categories ordered by name.
    async fn list_categories(&self) -> RepositoryResult<Vec<Category>>;

    /// Deletes a category and its product links. Child categories lose their
    /// parent. Returns false if it did not exist.
    async fn delete_category(&self, id: CategoryId) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Inserts a product together with its initial inventory.
    async fn insert_product(&self, product: &Product) -> RepositoryResult<()>;

    /// Replaces product data, categories and images. Inventory is left as
    /// stored.
    async fn save_product(&self, product: &Product) -> RepositoryResult<()>;

    async fn find_product(&self, id: ProductId) -> RepositoryResult<Option<Product>>;

    /// Loads several products at once; missing ids are skipped.
    async fn find_products(&self, ids: &[ProductId]) -> RepositoryResult<Vec<Product>>;

    /// Lists products ordered by name.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Product>>;

    /// Adds `delta` to on-hand stock. Returns `None` if the product does not
    /// exist or the result would drop below reserved stock or zero.
    async fn adjust_stock(&self, id: ProductId, delta: i64)
    -> RepositoryResult<Option<Inventory>>;

    /// Sets on-hand stock. Returns `None` if the product does not exist or
    /// the value is below reserved stock.
    async fn set_stock(&self, id: ProductId, on_hand: i64) -> RepositoryResult<Option<Inventory>>;

    /// Reserves stock if enough is available. Returns false otherwise.
    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<bool>;

    /// Returns previously reserved stock to the available pool.
    async fn release_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()>;

    /// Removes reserved stock from on-hand stock once it has shipped.
    async fn commit_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()>;

    /// Undoes `commit_stock`, returning the stock to on-hand and reserved.
    async fn restore_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()>;
}

#[async_trait]
pub trait SaleRepository: Send + Sync {
    async fn insert_sale(&self, sale: &Sale) -> RepositoryResult<()>;

    async fn save_sale(&self, sale: &Sale) -> RepositoryResult<()>;

    async fn find_sale(&self, id: SaleId) -> RepositoryResult<Option<Sale>>;

    async fn list_sales(&self, page: PageRequest) -> RepositoryResult<Page<Sale>>;

    /// Returns sales that are active and whose window contains `now`.
    async fn running_sales(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Sale>>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Inserts a coupon. Fails with `Conflict` if the code is taken.
    async fn insert_coupon(&self, coupon: &Coupon) -> RepositoryResult<()>;

    /// Replaces coupon data. The redemption counter is left as stored.
    async fn save_coupon(&self, coupon: &Coupon) -> RepositoryResult<()>;

    async fn find_coupon(&self, id: CouponId) -> RepositoryResult<Option<Coupon>>;

    async fn find_coupon_by_code(&self, code: &CouponCode) -> RepositoryResult<Option<Coupon>>;

    async fn list_coupons(&self, page: PageRequest) -> RepositoryResult<Page<Coupon>>;

    /// Increments the redemption counter unless the usage limit is reached.
    /// Returns false when the limit was hit.
    async fn redeem_coupon(&self, id: CouponId) -> RepositoryResult<bool>;

    /// Undoes a redemption made by a checkout that later failed.
    async fn unredeem_coupon(&self, id: CouponId) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ShippingMethodRepository: Send + Sync {
    async fn insert_shipping_method(&self, method: &ShippingMethod) -> RepositoryResult<()>;

    async fn save_shipping_method(&self, method: &ShippingMethod) -> RepositoryResult<()>;

    async fn find_shipping_method(
        &self,
        id: ShippingMethodId,
    ) -> RepositoryResult<Option<ShippingMethod>>;

    /// Lists shipping methods ordered by price.
    async fn list_shipping_methods(
        &self,
        include_inactive: bool,
    ) -> RepositoryResult<Vec<ShippingMethod>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> RepositoryResult<()>;

    /// Replaces an order with its payment, shipment and status history.
    async fn save_order(&self, order: &Order) -> RepositoryResult<()>;

    async fn find_order(&self, id: OrderId) -> RepositoryResult<Option<Order>>;

    /// Lists orders newest first.
    async fn list_orders(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Order>>;
}

/// Every repository the application needs, behind one cloneable handle.
pub trait Store:
    UserRepository
    + CategoryRepository
    + ProductRepository
    + SaleRepository
    + CouponRepository
    + ShippingMethodRepository
    + OrderRepository
    + Clone
    + 'static
{
}

impl<T> Store for T where
    T: UserRepository
        + CategoryRepository
        + ProductRepository
        + SaleRepository
        + CouponRepository
        + ShippingMethodRepository
        + OrderRepository
        + Clone
        + 'static
{
}
