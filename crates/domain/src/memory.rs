//! In-memory implementation of every repository port.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, CouponId, OrderId, ProductId, SaleId, ShippingMethodId, UserId};
use tokio::sync::RwLock;

use crate::catalog::{Category, Inventory, Product};
use crate::identity::{Email, User};
use crate::ordering::{Coupon, CouponCode, Order, Sale, ShippingMethod};
use crate::pagination::{Page, PageRequest};
use crate::ports::{
    CategoryRepository, CouponRepository, OrderFilter, OrderRepository, ProductFilter,
    ProductRepository, RepositoryError, RepositoryResult, SaleRepository,
    ShippingMethodRepository, UserRepository,
};

/// In-memory store for tests and for running without a database.
///
/// Provides the same guarantees as the PostgreSQL store: unique emails,
/// category names and coupon codes, and atomic stock and coupon counters.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    categories: Arc<RwLock<HashMap<CategoryId, Category>>>,
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    sales: Arc<RwLock<HashMap<SaleId, Sale>>>,
    coupons: Arc<RwLock<HashMap<CouponId, Coupon>>>,
    shipping_methods: Arc<RwLock<HashMap<ShippingMethodId, ShippingMethod>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(entity: &str, id: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Backend(format!("{entity} {id} does not exist"))
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict(
                "email is already registered".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        let slot = users.get_mut(&user.id).ok_or_else(|| missing("user", user.id))?;
        *slot = user.clone();
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn list_users(&self, page: PageRequest) -> RepositoryResult<Page<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(page.slice(users))
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn insert_category(&self, category: &Category) -> RepositoryResult<()> {
        let mut categories = self.categories.write().await;
        if categories.values().any(|c| c.has_name(&category.name)) {
            return Err(RepositoryError::Conflict(format!(
                "category '{}' already exists",
                category.name
            )));
        }
        categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn save_category(&self, category: &Category) -> RepositoryResult<()> {
        let mut categories = self.categories.write().await;
        if categories
            .values()
            .any(|c| c.id != category.id && c.has_name(&category.name))
        {
            return Err(RepositoryError::Conflict(format!(
                "category '{}' already exists",
                category.name
            )));
        }
        let slot = categories
            .get_mut(&category.id)
            .ok_or_else(|| missing("category", category.id))?;
        *slot = category.clone();
        Ok(())
    }

    async fn find_category(&self, id: CategoryId) -> RepositoryResult<Option<Category>> {
        Ok(self.categories.read().await.get(&id).cloned())
    }

    async fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.categories.read().await.values().cloned().collect();
        categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> RepositoryResult<bool> {
        let mut categories = self.categories.write().await;
        if categories.remove(&id).is_none() {
            return Ok(false);
        }
        for child in categories.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
        let mut products = self.products.write().await;
        for product in products.values_mut() {
            product.category_ids.remove(&id);
        }
        Ok(true)
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> RepositoryResult<()> {
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn save_product(&self, product: &Product) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        let slot = products
            .get_mut(&product.id)
            .ok_or_else(|| missing("product", product.id))?;
        let inventory = slot.inventory;
        *slot = product.clone();
        slot.inventory = inventory;
        Ok(())
    }

    async fn find_product(&self, id: ProductId) -> RepositoryResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[ProductId]) -> RepositoryResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Product>> {
        let mut products: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| filter.include_inactive || p.is_active)
            .filter(|p| filter.category_id.is_none_or(|c| p.in_category(c)))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page.slice(products))
    }

    async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i64,
    ) -> RepositoryResult<Option<Inventory>> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(None);
        };
        Ok(product.inventory.adjust(delta).ok().map(|()| product.inventory))
    }

    async fn set_stock(&self, id: ProductId, on_hand: i64) -> RepositoryResult<Option<Inventory>> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(None);
        };
        Ok(product
            .inventory
            .set_on_hand(on_hand)
            .ok()
            .map(|()| product.inventory))
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<bool> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or_else(|| missing("product", id))?;
        Ok(product.inventory.reserve(quantity).is_ok())
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or_else(|| missing("product", id))?;
        product
            .inventory
            .release(quantity)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))
    }

    async fn commit_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or_else(|| missing("product", id))?;
        product
            .inventory
            .commit(quantity)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))
    }

    async fn restore_stock(&self, id: ProductId, quantity: u32) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or_else(|| missing("product", id))?;
        product
            .inventory
            .restore(quantity)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))
    }
}

#[async_trait]
impl SaleRepository for InMemoryStore {
    async fn insert_sale(&self, sale: &Sale) -> RepositoryResult<()> {
        self.sales.write().await.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn save_sale(&self, sale: &Sale) -> RepositoryResult<()> {
        let mut sales = self.sales.write().await;
        let slot = sales.get_mut(&sale.id).ok_or_else(|| missing("sale", sale.id))?;
        *slot = sale.clone();
        Ok(())
    }

    async fn find_sale(&self, id: SaleId) -> RepositoryResult<Option<Sale>> {
        Ok(self.sales.read().await.get(&id).cloned())
    }

    async fn list_sales(&self, page: PageRequest) -> RepositoryResult<Page<Sale>> {
        let mut sales: Vec<Sale> = self.sales.read().await.values().cloned().collect();
        sales.sort_by_key(|s| (s.created_at, s.id));
        Ok(page.slice(sales))
    }

    async fn running_sales(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self
            .sales
            .read()
            .await
            .values()
            .filter(|s| s.is_running(now))
            .cloned()
            .collect();
        sales.sort_by_key(|s| (s.created_at, s.id));
        Ok(sales)
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn insert_coupon(&self, coupon: &Coupon) -> RepositoryResult<()> {
        let mut coupons = self.coupons.write().await;
        if coupons.values().any(|c| c.code == coupon.code) {
            return Err(RepositoryError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            )));
        }
        coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn save_coupon(&self, coupon: &Coupon) -> RepositoryResult<()> {
        let mut coupons = self.coupons.write().await;
        if coupons
            .values()
            .any(|c| c.id != coupon.id && c.code == coupon.code)
        {
            return Err(RepositoryError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            )));
        }
        let slot = coupons
            .get_mut(&coupon.id)
            .ok_or_else(|| missing("coupon", coupon.id))?;
        let times_used = slot.times_used;
        *slot = coupon.clone();
        slot.times_used = times_used;
        Ok(())
    }

    async fn find_coupon(&self, id: CouponId) -> RepositoryResult<Option<Coupon>> {
        Ok(self.coupons.read().await.get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &CouponCode) -> RepositoryResult<Option<Coupon>> {
        Ok(self
            .coupons
            .read()
            .await
            .values()
            .find(|c| &c.code == code)
            .cloned())
    }

    async fn list_coupons(&self, page: PageRequest) -> RepositoryResult<Page<Coupon>> {
        let mut coupons: Vec<Coupon> = self.coupons.read().await.values().cloned().collect();
        coupons.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(page.slice(coupons))
    }

    async fn redeem_coupon(&self, id: CouponId) -> RepositoryResult<bool> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons.get_mut(&id).ok_or_else(|| missing("coupon", id))?;
        if coupon.is_exhausted() {
            return Ok(false);
        }
        coupon.times_used += 1;
        Ok(true)
    }

    async fn unredeem_coupon(&self, id: CouponId) -> RepositoryResult<()> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons.get_mut(&id).ok_or_else(|| missing("coupon", id))?;
        coupon.times_used = coupon.times_used.saturating_sub(1);
        Ok(())
    }
}

#[async_trait]
impl ShippingMethodRepository for InMemoryStore {
    async fn insert_shipping_method(&self, method: &ShippingMethod) -> RepositoryResult<()> {
        self.shipping_methods
            .write()
            .await
            .insert(method.id, method.clone());
        Ok(())
    }

    async fn save_shipping_method(&self, method: &ShippingMethod) -> RepositoryResult<()> {
        let mut methods = self.shipping_methods.write().await;
        let slot = methods
            .get_mut(&method.id)
            .ok_or_else(|| missing("shipping method", method.id))?;
        *slot = method.clone();
        Ok(())
    }

    async fn find_shipping_method(
        &self,
        id: ShippingMethodId,
    ) -> RepositoryResult<Option<ShippingMethod>> {
        Ok(self.shipping_methods.read().await.get(&id).cloned())
    }

    async fn list_shipping_methods(
        &self,
        include_inactive: bool,
    ) -> RepositoryResult<Vec<ShippingMethod>> {
        let mut methods: Vec<ShippingMethod> = self
            .shipping_methods
            .read()
            .await
            .values()
            .filter(|m| include_inactive || m.is_active)
            .cloned()
            .collect();
        methods.sort_by(|a, b| a.price.cmp(&b.price).then(a.name.cmp(&b.name)));
        Ok(methods)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> RepositoryResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> RepositoryResult<()> {
        let mut orders = self.orders.write().await;
        let slot = orders
            .get_mut(&order.id)
            .ok_or_else(|| missing("order", order.id))?;
        *slot = order.clone();
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> RepositoryResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> RepositoryResult<Page<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id == u))
            .filter(|o| {
                filter
                    .carrier_id
                    .is_none_or(|c| o.shipment.carrier_id == Some(c))
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(orders))
    }
}
