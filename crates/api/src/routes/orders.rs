//! Quote, checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::{PlaceOrder, ShipOrder};
use common::{OrderId, Percentage, PaymentId, ProductId, ShippingMethodId, UserId};
use domain::identity::Address;
use domain::ordering::{
    AppliedDiscount, CouponCode, DiscountKind, LineItem, OrderPricing, Payment, PaymentMethod,
    PaymentStatus, Shipment, StatusChange,
};
use domain::{Order, OrderRequest, OrderStatus, Page, PricedOrder, Store};
use serde::{Deserialize, Serialize};

use super::PageQuery;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        Self {
            line_total_cents: item.total().cents(),
            product_id: item.product_id,
            product_name: item.product_name,
            unit_price_cents: item.purchased_price.cents(),
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscountResponse {
    pub kind: DiscountKind,
    pub source_id: uuid::Uuid,
    pub label: String,
    pub percentage: Percentage,
    pub amount_cents: i64,
}

impl From<AppliedDiscount> for DiscountResponse {
    fn from(discount: AppliedDiscount) -> Self {
        Self {
            kind: discount.kind,
            source_id: discount.source_id,
            label: discount.label,
            percentage: discount.percentage,
            amount_cents: discount.amount.cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub subtotal_cents: i64,
    pub discount_total_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub discounts: Vec<DiscountResponse>,
}

impl From<OrderPricing> for PricingResponse {
    fn from(pricing: OrderPricing) -> Self {
        Self {
            subtotal_cents: pricing.subtotal.cents(),
            discount_total_cents: pricing.discount_total.cents(),
            shipping_cents: pricing.shipping.cents(),
            total_cents: pricing.total.cents(),
            discounts: pricing.discounts.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            amount_cents: payment.amount.cents(),
            method: payment.method,
            status: payment.status,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub items: Vec<LineItemResponse>,
    pub coupon_codes: Vec<CouponCode>,
    pub shipping_method_id: ShippingMethodId,
    pub shipping_address: Address,
    pub pricing: PricingResponse,
}

impl From<PricedOrder> for QuoteResponse {
    fn from(priced: PricedOrder) -> Self {
        Self {
            items: priced.line_items.into_iter().map(Into::into).collect(),
            coupon_codes: priced.coupons.into_iter().map(|(_, code)| code).collect(),
            shipping_method_id: priced.shipping_method_id,
            shipping_address: priced.shipping_address,
            pricing: priced.pricing.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<LineItemResponse>,
    pub coupon_codes: Vec<CouponCode>,
    pub shipping_method_id: ShippingMethodId,
    pub shipping_address: Address,
    pub pricing: PricingResponse,
    pub payment: PaymentResponse,
    pub shipment: Shipment,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            items: order.line_items.into_iter().map(Into::into).collect(),
            coupon_codes: order.coupon_codes,
            shipping_method_id: order.shipping_method_id,
            shipping_address: order.shipping_address,
            pricing: order.pricing.into(),
            payment: order.payment.into(),
            shipment: order.shipment,
            status_history: order.status_history,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders/quote: prices a request without placing it.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn quote<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<OrderRequest>,
) -> Result<axum::Json<QuoteResponse>, ApiError> {
    let priced = state.orders.quote(&user, &req).await?;
    Ok(axum::Json(priced.into()))
}

/// POST /orders: checkout.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<PlaceOrder>,
) -> Result<(StatusCode, axum::Json<OrderResponse>), ApiError> {
    let order = state.checkout.place_order(&user, req).await?;
    Ok((StatusCode::CREATED, axum::Json(order.into())))
}

/// GET /orders: own orders, or every order for admins. Newest first.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<OrderResponse>>, ApiError> {
    let orders = state
        .orders
        .list_orders_for(&user, query.page_request())
        .await?;
    Ok(axum::Json(orders.map(OrderResponse::from)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
) -> Result<axum::Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order_for(&user, id).await?;
    Ok(axum::Json(order.into()))
}

/// POST /orders/{id}/cancel: the body `{ "reason": ... }` is optional.
#[tracing::instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
    body: Bytes,
) -> Result<axum::Json<OrderResponse>, ApiError> {
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Failed to parse the request body: {e}")))?
    };
    let order = state.checkout.cancel_order(&user, id, req.reason).await?;
    Ok(axum::Json(order.into()))
}

/// POST /orders/{id}/ship: admin only.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn ship<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
    Json(req): Json<ShipOrder>,
) -> Result<axum::Json<OrderResponse>, ApiError> {
    let order = state.checkout.ship_order(&user, id, req).await?;
    Ok(axum::Json(order.into()))
}

/// POST /orders/{id}/deliver: the assigned carrier or an admin.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn deliver<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
) -> Result<axum::Json<OrderResponse>, ApiError> {
    let order = state.checkout.deliver_order(&user, id).await?;
    Ok(axum::Json(order.into()))
}

/// GET /shipments: orders assigned to the requesting carrier.
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn shipments<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<OrderResponse>>, ApiError> {
    let orders = state
        .orders
        .list_shipments_for_carrier(&user, query.page_request())
        .await?;
    Ok(axum::Json(orders.map(OrderResponse::from)))
}
