//! Order queries, order pricing and promotion administration.

use std::collections::HashMap;

use chrono::Utc;
use common::{AddressId, CouponId, OrderId, ProductId, SaleId, ShippingMethodId};
use serde::Deserialize;

use super::pricing::parse_coupon_codes;
use super::{
    Coupon, CouponInput, LineItem, Order, PricedOrder, PricingLine, Sale, SaleInput,
    ShippingMethod, ShippingMethodInput, price_order,
};
use crate::error::{DomainError, Result, ValidationErrors};
use crate::identity::access::{require_role, require_self_or_admin};
use crate::identity::{Address, Role, User};
use crate::pagination::{Page, PageRequest};
use crate::ports::{
    CouponRepository, OrderFilter, OrderRepository, ProductRepository, SaleRepository,
    ShippingMethodRepository,
};

/// Highest quantity of one product on an order.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// What a customer asks to buy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderRequest {
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub coupon_codes: Vec<String>,
    pub shipping_method_id: ShippingMethodId,
    /// Defaults to the user's default address.
    #[serde(default)]
    pub address_id: Option<AddressId>,
}

impl OrderRequest {
    /// Checks the request shape and merges repeated products, keeping the
    /// first occurrence's position.
    fn normalized_items(&self) -> Result<Vec<OrderItemRequest>> {
        let mut errors = ValidationErrors::new();
        if self.items.is_empty() {
            errors.add("items", "at least one item is required");
        }

        let mut merged: Vec<OrderItemRequest> = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                errors.add(format!("items[{index}].quantity"), "must be greater than zero");
                continue;
            }
            match merged.iter_mut().find(|m| m.product_id == item.product_id) {
                Some(existing) => match existing.quantity.checked_add(item.quantity) {
                    Some(total) => existing.quantity = total,
                    None => errors.add(format!("items[{index}].quantity"), "is too large"),
                },
                None => merged.push(*item),
            }
        }

        for item in &merged {
            if item.quantity > MAX_LINE_QUANTITY {
                errors.add(
                    "items",
                    format!(
                        "quantity of product {} must be at most {MAX_LINE_QUANTITY}",
                        item.product_id
                    ),
                );
            }
        }

        if let Err(coupon_errors) = parse_coupon_codes(&self.coupon_codes) {
            errors.merge(coupon_errors);
        }
        errors.into_result()?;
        Ok(merged)
    }
}

/// Service for reading orders and pricing new ones.
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S> OrderService<S>
where
    S: ProductRepository
        + ShippingMethodRepository
        + CouponRepository
        + SaleRepository
        + OrderRepository,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates a request against the catalog and prices it.
    ///
    /// Nothing is reserved or persisted.
    #[tracing::instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn quote(&self, user: &User, request: &OrderRequest) -> Result<PricedOrder> {
        let items = request.normalized_items()?;

        if !user.is_active {
            return Err(DomainError::Forbidden("account is deactivated".to_string()));
        }
        let shipping_address = shipping_address(user, request.address_id)?;

        let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
        let products: HashMap<ProductId, _> = self
            .store
            .find_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut errors = ValidationErrors::new();
        let mut line_items = Vec::with_capacity(items.len());
        let mut pricing_lines = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Some(product) = products.get(&item.product_id) else {
                return Err(DomainError::not_found("product", item.product_id));
            };
            if !product.is_active {
                errors.add(
                    format!("items[{index}].product_id"),
                    format!("product {} is not available", product.id),
                );
                continue;
            }
            line_items.push(LineItem {
                product_id: product.id,
                product_name: product.name.clone(),
                purchased_price: product.price,
                quantity: item.quantity,
            });
            pricing_lines.push(PricingLine {
                product_id: product.id,
                unit_price: product.price,
                quantity: item.quantity,
                category_ids: product.category_ids.clone(),
            });
        }

        let method = self
            .store
            .find_shipping_method(request.shipping_method_id)
            .await?
            .ok_or_else(|| DomainError::not_found("shipping method", request.shipping_method_id))?;
        if !method.is_active {
            errors.add("shipping_method_id", "shipping method is not available");
        }

        let mut coupons = Vec::new();
        for code in parse_coupon_codes(&request.coupon_codes)? {
            match self.store.find_coupon_by_code(&code).await? {
                Some(coupon) => coupons.push(coupon),
                None => errors.add("coupon_codes", format!("unknown coupon {code}")),
            }
        }
        errors.into_result()?;

        let now = Utc::now();
        let sales = self.store.running_sales(now).await?;
        let pricing = price_order(&pricing_lines, &sales, &coupons, method.price, now)?;

        Ok(PricedOrder {
            user_id: user.id,
            line_items,
            coupons: coupons.into_iter().map(|c| (c.id, c.code)).collect(),
            shipping_method_id: method.id,
            shipping_address,
            pricing,
        })
    }

    /// Loads an order for its owner or an admin.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn get_order_for(&self, requester: &User, id: OrderId) -> Result<Order> {
        let order = self.find_order(id).await?;
        require_self_or_admin(requester, order.user_id)
            .map_err(|_| DomainError::Forbidden("not allowed to access this order".to_string()))?;
        Ok(order)
    }

    /// Customers see their own orders; admins see every order.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn list_orders_for(&self, requester: &User, page: PageRequest) -> Result<Page<Order>> {
        let filter = OrderFilter {
            user_id: (!requester.is_admin()).then_some(requester.id),
            carrier_id: None,
        };
        Ok(self.store.list_orders(filter, page).await?)
    }

    /// Orders whose shipment is assigned to the requesting carrier.
    #[tracing::instrument(skip(self, carrier), fields(carrier_id = %carrier.id))]
    pub async fn list_shipments_for_carrier(
        &self,
        carrier: &User,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        require_role(carrier, Role::Carrier)?;
        let filter = OrderFilter {
            user_id: None,
            carrier_id: Some(carrier.id),
        };
        Ok(self.store.list_orders(filter, page).await?)
    }

    pub async fn find_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .find_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))
    }
}

/// Picks the requested address or the user's default.
fn shipping_address(user: &User, address_id: Option<AddressId>) -> Result<Address> {
    match address_id {
        Some(id) => user
            .find_address(id)
            .cloned()
            .ok_or_else(|| DomainError::invalid("address_id", "address does not belong to the user")),
        None => user
            .default_address()
            .cloned()
            .ok_or_else(|| DomainError::invalid("address_id", "no shipping address on file")),
    }
}

/// Service for sales, coupons and shipping methods.
#[derive(Debug, Clone)]
pub struct PromotionService<S> {
    store: S,
}

impl<S> PromotionService<S>
where
    S: SaleRepository + CouponRepository + ShippingMethodRepository,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_sale(&self, input: SaleInput) -> Result<Sale> {
        let sale = Sale::new(input, Utc::now())?;
        self.store.insert_sale(&sale).await?;
        tracing::info!(sale_id = %sale.id, "sale created");
        Ok(sale)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_sale(&self, id: SaleId, input: SaleInput) -> Result<Sale> {
        let mut sale = self.get_sale(id).await?;
        sale.update(input, Utc::now())?;
        self.store.save_sale(&sale).await?;
        Ok(sale)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_sale(&self, id: SaleId) -> Result<Sale> {
        self.store
            .find_sale(id)
            .await?
            .ok_or_else(|| DomainError::not_found("sale", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_sales(&self, page: PageRequest) -> Result<Page<Sale>> {
        Ok(self.store.list_sales(page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_sale(&self, id: SaleId) -> Result<()> {
        let mut sale = self.get_sale(id).await?;
        sale.deactivate(Utc::now());
        self.store.save_sale(&sale).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_coupon(&self, input: CouponInput) -> Result<Coupon> {
        let coupon = Coupon::new(input, Utc::now())?;
        if self.store.find_coupon_by_code(&coupon.code).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            )));
        }
        self.store.insert_coupon(&coupon).await?;
        tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_coupon(&self, id: CouponId, input: CouponInput) -> Result<Coupon> {
        let mut coupon = self.get_coupon(id).await?;
        coupon.update(input, Utc::now())?;
        if let Some(other) = self.store.find_coupon_by_code(&coupon.code).await?
            && other.id != id
        {
            return Err(DomainError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            )));
        }
        self.store.save_coupon(&coupon).await?;
        Ok(coupon)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_coupon(&self, id: CouponId) -> Result<Coupon> {
        self.store
            .find_coupon(id)
            .await?
            .ok_or_else(|| DomainError::not_found("coupon", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_coupons(&self, page: PageRequest) -> Result<Page<Coupon>> {
        Ok(self.store.list_coupons(page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_coupon(&self, id: CouponId) -> Result<()> {
        let mut coupon = self.get_coupon(id).await?;
        coupon.deactivate(Utc::now());
        self.store.save_coupon(&coupon).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_shipping_method(&self, input: ShippingMethodInput) -> Result<ShippingMethod> {
        let method = ShippingMethod::new(input, Utc::now())?;
        self.store.insert_shipping_method(&method).await?;
        Ok(method)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_shipping_method(
        &self,
        id: ShippingMethodId,
        input: ShippingMethodInput,
    ) -> Result<ShippingMethod> {
        let mut method = self.get_shipping_method(id).await?;
        method.update(input, Utc::now())?;
        self.store.save_shipping_method(&method).await?;
        Ok(method)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_shipping_method(&self, id: ShippingMethodId) -> Result<ShippingMethod> {
        self.store
            .find_shipping_method(id)
            .await?
            .ok_or_else(|| DomainError::not_found("shipping method", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_shipping_methods(&self, include_inactive: bool) -> Result<Vec<ShippingMethod>> {
        Ok(self.store.list_shipping_methods(include_inactive).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_shipping_method(&self, id: ShippingMethodId) -> Result<()> {
        let mut method = self.get_shipping_method(id).await?;
        method.deactivate(Utc::now());
        self.store.save_shipping_method(&method).await?;
        Ok(())
    }
}
