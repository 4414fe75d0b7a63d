//! Product, image and inventory endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CategoryId, ImageId, Money, ProductId};
use domain::catalog::{ImageInput, NewProduct, ProductImage, ProductUpdate};
use domain::identity::access::require_admin;
use domain::ports::ProductFilter;
use domain::{Inventory, Page, PageRequest, Product, Store};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Honoured for admins only.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub category_ids: BTreeSet<CategoryId>,
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_ids: Option<BTreeSet<CategoryId>>,
    pub is_active: Option<bool>,
}

/// Either a relative `delta` or an absolute `on_hand`.
#[derive(Deserialize)]
pub struct InventoryRequest {
    pub delta: Option<i64>,
    pub on_hand: Option<i64>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
}

impl From<Inventory> for StockResponse {
    fn from(inventory: Inventory) -> Self {
        Self {
            on_hand: inventory.on_hand(),
            reserved: inventory.reserved(),
            available: inventory.available(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category_ids: BTreeSet<CategoryId>,
    pub stock: StockResponse,
    pub images: Vec<ProductImage>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            category_ids: product.category_ids,
            stock: product.inventory.into(),
            images: product.images,
            is_active: product.is_active,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// -- Handlers --

/// GET /products: active products, filtered and paged.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    requester: MaybeAuthUser,
    Query(query): Query<ProductQuery>,
) -> Result<axum::Json<Page<ProductResponse>>, ApiError> {
    let filter = ProductFilter {
        category_id: query.category_id,
        include_inactive: query.include_inactive && requester.is_admin(),
    };
    let page = PageRequest::from_query(query.page, query.per_page);
    let products = state.catalog.list_products(filter, page).await?;
    Ok(axum::Json(products.map(ProductResponse::from)))
}

/// GET /products/{id}: inactive products are visible to admins only.
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    requester: MaybeAuthUser,
    Path(id): Path<ProductId>,
) -> Result<axum::Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(id, requester.is_admin()).await?;
    Ok(axum::Json(product.into()))
}

/// POST /products
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, axum::Json<ProductResponse>), ApiError> {
    require_admin(&user)?;
    let product = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            category_ids: req.category_ids,
            initial_stock: req.initial_stock,
        })
        .await?;
    Ok((StatusCode::CREATED, axum::Json(product.into())))
}

/// PUT /products/{id}: absent fields are left unchanged.
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<axum::Json<ProductResponse>, ApiError> {
    require_admin(&user)?;
    let update = ProductUpdate {
        name: req.name,
        description: req.description,
        price: req.price_cents.map(Money::from_cents),
        category_ids: req.category_ids,
        is_active: req.is_active,
    };
    let product = state.catalog.update_product(id, update).await?;
    Ok(axum::Json(product.into()))
}

/// DELETE /products/{id}: soft delete.
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    state.catalog.deactivate_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/images
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn add_image<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
    Json(req): Json<ImageInput>,
) -> Result<(StatusCode, axum::Json<ProductImage>), ApiError> {
    require_admin(&user)?;
    let image = state.catalog.add_image(id, req).await?;
    Ok((StatusCode::CREATED, axum::Json(image)))
}

/// DELETE /products/{id}/images/{image_id}
#[tracing::instrument(skip(state, user), fields(requester = %user.id))]
pub async fn remove_image<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path((id, image_id)): Path<(ProductId, ImageId)>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    state.catalog.remove_image(id, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /products/{id}/inventory
#[tracing::instrument(skip(state, user, req), fields(requester = %user.id))]
pub async fn update_inventory<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
    Json(req): Json<InventoryRequest>,
) -> Result<axum::Json<StockResponse>, ApiError> {
    require_admin(&user)?;
    let inventory = match (req.delta, req.on_hand) {
        (Some(delta), None) => state.catalog.adjust_inventory(id, delta).await?,
        (None, Some(on_hand)) => state.catalog.set_stock(id, on_hand).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of `delta` or `on_hand` is required".to_string(),
            ));
        }
    };
    Ok(axum::Json(inventory.into()))
}
