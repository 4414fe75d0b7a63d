//! Payment gateway port and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId};
use domain::ordering::{PaymentMethod, PaymentStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CheckoutError;

/// Result of a successful authorization.
#[derive(Debug, Clone)]
pub struct Authorization {
    /// Reference assigned by the gateway, used to capture or void.
    pub reference: String,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Places a hold on the order total.
    async fn authorize(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Authorization, CheckoutError>;

    /// Collects a previously authorized payment. Capturing a payment that is
    /// already captured succeeds.
    async fn capture(&self, reference: &str) -> Result<(), CheckoutError>;

    /// Releases a previously authorized payment. Voiding a payment that is
    /// already voided succeeds.
    async fn void(&self, reference: &str) -> Result<(), CheckoutError>;
}

#[derive(Debug, Clone)]
struct GatewayPayment {
    /// Unknown for authorizations issued before this gateway was created.
    authorized: Option<(OrderId, Money)>,
    status: PaymentStatus,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    payments: HashMap<String, GatewayPayment>,
    fail_on_authorize: bool,
    fail_on_capture: bool,
}

/// In-memory payment gateway that approves everything unless told otherwise.
///
/// Payments live only as long as the process. A reference this gateway has
/// never seen is taken to be an authorization from an earlier run and is
/// adopted as authorized on first capture or void; callers only pass
/// references of payments they have stored as authorized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline authorizations.
    pub async fn set_fail_on_authorize(&self, fail: bool) {
        self.state.write().await.fail_on_authorize = fail;
    }

    /// Configures the gateway to fail captures.
    pub async fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().await.fail_on_capture = fail;
    }

    /// Returns the number of payments the gateway knows about.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// Returns the status of a payment by reference.
    pub async fn status_of(&self, reference: &str) -> Option<PaymentStatus> {
        self.state
            .read()
            .await
            .payments
            .get(reference)
            .map(|p| p.status)
    }

    /// Returns the order and amount of a payment by reference.
    pub async fn payment_for(&self, reference: &str) -> Option<(OrderId, Money)> {
        self.state
            .read()
            .await
            .payments
            .get(reference)
            .and_then(|p| p.authorized)
    }

    async fn transition(
        &self,
        reference: &str,
        to: PaymentStatus,
    ) -> Result<(), CheckoutError> {
        let mut state = self.state.write().await;
        if to == PaymentStatus::Captured && state.fail_on_capture {
            return Err(CheckoutError::Gateway("capture failed".to_string()));
        }
        let payment = state
            .payments
            .entry(reference.to_string())
            .or_insert_with(|| {
                tracing::warn!(%reference, "adopting authorization from an earlier run");
                GatewayPayment {
                    authorized: None,
                    status: PaymentStatus::Authorized,
                }
            });
        if payment.status == to {
            return Ok(());
        }
        if payment.status != PaymentStatus::Authorized {
            return Err(CheckoutError::Gateway(format!(
                "payment {reference} is already {}",
                payment.status
            )));
        }
        payment.status = to;
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(
        &self,
        order_id: OrderId,
        amount: Money,
        _method: PaymentMethod,
    ) -> Result<Authorization, CheckoutError> {
        let mut state = self.state.write().await;

        if state.fail_on_authorize {
            return Err(CheckoutError::PaymentDeclined(
                "authorization refused".to_string(),
            ));
        }

        let reference = format!("AUTH-{}", Uuid::new_v4().simple());
        state.payments.insert(
            reference.clone(),
            GatewayPayment {
                authorized: Some((order_id, amount)),
                status: PaymentStatus::Authorized,
            },
        );

        Ok(Authorization { reference })
    }

    async fn capture(&self, reference: &str) -> Result<(), CheckoutError> {
        self.transition(reference, PaymentStatus::Captured).await
    }

    async fn void(&self, reference: &str) -> Result<(), CheckoutError> {
        self.transition(reference, PaymentStatus::Voided).await
    }
}
