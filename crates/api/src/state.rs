//! Shared application state.

use checkout::{CheckoutCoordinator, InMemoryPaymentGateway};
use domain::{CatalogService, IdentityService, OrderService, PromotionService, Store};

use crate::auth::TokenSigner;

/// Services and signing key shared by all handlers.
pub struct AppState<S: Store> {
    pub identity: IdentityService<S>,
    pub catalog: CatalogService<S>,
    pub promotions: PromotionService<S>,
    pub orders: OrderService<S>,
    pub checkout: CheckoutCoordinator<S, InMemoryPaymentGateway>,
    pub tokens: TokenSigner,
}

impl<S: Store> AppState<S> {
    /// Wires every service over one store.
    pub fn new(store: S, gateway: InMemoryPaymentGateway, tokens: TokenSigner) -> Self {
        Self {
            identity: IdentityService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            promotions: PromotionService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            checkout: CheckoutCoordinator::new(store, gateway),
            tokens,
        }
    }
}
