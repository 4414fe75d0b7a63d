//! Integration tests for order placement and the order lifecycle.

use std::collections::BTreeSet;

use checkout::{CheckoutCoordinator, CheckoutError, InMemoryPaymentGateway, PlaceOrder, ShipOrder};
use chrono::{Duration, Utc};
use common::{Money, Percentage, ProductId, ShippingMethodId};
use domain::catalog::NewProduct;
use domain::identity::{AddressInput, Registration};
use domain::ordering::{
    CouponInput, OrderItemRequest, PaymentMethod, PaymentStatus, ProductTargets,
    ShipmentStatus, ShippingMethodInput,
};
use domain::ports::{CouponRepository, OrderRepository, ProductRepository};
use domain::{
    CatalogService, DomainError, IdentityService, InMemoryStore, OrderRequest, OrderStatus,
    PromotionService, User,
};

struct Fixture {
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
    checkout: CheckoutCoordinator<InMemoryStore, InMemoryPaymentGateway>,
    admin: User,
    customer: User,
    carrier: User,
    widget: ProductId,
    gadget: ProductId,
    shipping_method_id: ShippingMethodId,
}

fn registration(email: &str) -> Registration {
    Registration {
        email: email.to_string(),
        password: "correct horse battery".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
    }
}

async fn product(catalog: &CatalogService<InMemoryStore>, name: &str, cents: i64, stock: i64) -> ProductId {
    catalog
        .create_product(NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(cents),
            category_ids: BTreeSet::new(),
            initial_stock: stock,
        })
        .await
        .unwrap()
        .id
}

async fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let identity = IdentityService::new(store.clone());
    let admin = identity
        .ensure_admin("admin@example.com", "admin password")
        .await
        .unwrap();
    let customer = identity
        .register_customer(registration("jane@example.com"))
        .await
        .unwrap();
    identity
        .add_address(
            &customer,
            customer.id,
            AddressInput {
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62701".to_string(),
                country: "US".to_string(),
                is_default: true,
            },
        )
        .await
        .unwrap();
    let customer = identity.get_user(customer.id).await.unwrap();
    let carrier = identity
        .register_carrier(registration("carrier@example.com"))
        .await
        .unwrap();

    let catalog = CatalogService::new(store.clone());
    let widget = product(&catalog, "Widget", 2500, 10).await;
    let gadget = product(&catalog, "Gadget", 1000, 1).await;

    let method = PromotionService::new(store.clone())
        .create_shipping_method(ShippingMethodInput {
            name: "Ground".to_string(),
            price: Money::from_cents(599),
            estimated_days: 5,
            is_active: true,
        })
        .await
        .unwrap();

    let gateway = InMemoryPaymentGateway::new();
    let checkout = CheckoutCoordinator::new(store.clone(), gateway.clone());

    Fixture {
        store,
        gateway,
        checkout,
        admin,
        customer,
        carrier,
        widget,
        gadget,
        shipping_method_id: method.id,
    }
}

fn place(fixture: &Fixture, items: &[(ProductId, u32)], coupons: &[&str]) -> PlaceOrder {
    PlaceOrder {
        request: OrderRequest {
            items: items
                .iter()
                .map(|(product_id, quantity)| OrderItemRequest {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
            coupon_codes: coupons.iter().map(|c| c.to_string()).collect(),
            shipping_method_id: fixture.shipping_method_id,
            address_id: None,
        },
        payment_method: PaymentMethod::Card,
    }
}

async fn stock(fixture: &Fixture, id: ProductId) -> (i64, i64) {
    let product = fixture.store.find_product(id).await.unwrap().unwrap();
    (product.inventory.on_hand(), product.inventory.reserved())
}

async fn limited_coupon(fixture: &Fixture, code: &str, limit: u32) -> common::CouponId {
    let now = Utc::now();
    PromotionService::new(fixture.store.clone())
        .create_coupon(CouponInput {
            code: code.to_string(),
            percentage: Percentage::new(10).unwrap(),
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
            usage_limit: Some(limit),
            min_order_amount: None,
            targets: ProductTargets::default(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn placing_an_order_reserves_stock_and_authorizes_payment() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 2)], &[]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.pricing.total, Money::from_cents(5599));
    assert_eq!(order.payment.status, PaymentStatus::Authorized);
    assert_eq!(order.payment.amount, order.pricing.total);
    assert_eq!(
        fixture.gateway.status_of(&order.payment.gateway_reference).await,
        Some(PaymentStatus::Authorized)
    );
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 2));

    let stored = fixture.store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored, order);
}

#[tokio::test]
async fn insufficient_stock_releases_earlier_reservations() {
    let fixture = fixture().await;
    let err = fixture
        .checkout
        .place_order(
            &fixture.customer,
            place(&fixture, &[(fixture.widget, 3), (fixture.gadget, 2)], &[]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::InsufficientStock { product_id } if product_id == fixture.gadget
    ));
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 0));
    assert_eq!(stock(&fixture, fixture.gadget).await, (1, 0));
    assert_eq!(fixture.gateway.payment_count().await, 0);
}

#[tokio::test]
async fn exhausted_coupon_rolls_back_the_checkout() {
    let fixture = fixture().await;
    let coupon_id = limited_coupon(&fixture, "ONCE", 1).await;

    fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 1)], &["once"]))
        .await
        .unwrap();
    let err = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 1)], &["once"]))
        .await
        .unwrap_err();

    // Pricing already rejects a coupon at its limit.
    assert!(matches!(
        err,
        CheckoutError::Domain(DomainError::Validation(_)) | CheckoutError::CouponUnavailable { .. }
    ));
    let coupon = fixture.store.find_coupon(coupon_id).await.unwrap().unwrap();
    assert_eq!(coupon.times_used, 1);
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 1));
}

#[tokio::test]
async fn declined_payment_undoes_reservations_and_redemptions() {
    let fixture = fixture().await;
    let coupon_id = limited_coupon(&fixture, "SAVE10", 5).await;
    fixture.gateway.set_fail_on_authorize(true).await;

    let err = fixture
        .checkout
        .place_order(
            &fixture.customer,
            place(&fixture, &[(fixture.widget, 2)], &["SAVE10"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentDeclined(_)));
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 0));
    let coupon = fixture.store.find_coupon(coupon_id).await.unwrap().unwrap();
    assert_eq!(coupon.times_used, 0);
    let page = fixture
        .store
        .list_orders(Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn cancelling_voids_payment_and_releases_stock() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 4)], &[]))
        .await
        .unwrap();

    let cancelled = fixture
        .checkout
        .cancel_order(&fixture.customer, order.id, Some("changed my mind".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment.status, PaymentStatus::Voided);
    assert_eq!(
        fixture.gateway.status_of(&order.payment.gateway_reference).await,
        Some(PaymentStatus::Voided)
    );
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 0));

    let again = fixture
        .checkout
        .cancel_order(&fixture.customer, order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(again, CheckoutError::Domain(DomainError::Order(_))));
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 0));
}

#[tokio::test]
async fn strangers_cannot_cancel() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 1)], &[]))
        .await
        .unwrap();

    let err = fixture
        .checkout
        .cancel_order(&fixture.carrier, order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Domain(DomainError::Forbidden(_))));
}

#[tokio::test]
async fn shipping_captures_payment_and_commits_stock() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 3)], &[]))
        .await
        .unwrap();

    let shipped = fixture
        .checkout
        .ship_order(
            &fixture.admin,
            order.id,
            ShipOrder {
                carrier_id: fixture.carrier.id,
                tracking_number: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.payment.status, PaymentStatus::Captured);
    assert_eq!(shipped.shipment.status, ShipmentStatus::InTransit);
    assert_eq!(shipped.shipment.carrier_id, Some(fixture.carrier.id));
    let tracking = shipped.shipment.tracking_number.clone().unwrap();
    assert!(tracking.starts_with("TRK-"));
    assert_eq!(tracking.len(), 14);
    assert_eq!(
        fixture.gateway.status_of(&order.payment.gateway_reference).await,
        Some(PaymentStatus::Captured)
    );
    assert_eq!(stock(&fixture, fixture.widget).await, (7, 0));

    let err = fixture
        .checkout
        .cancel_order(&fixture.customer, order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Domain(DomainError::Order(_))));
}

#[tokio::test]
async fn only_admins_ship_to_active_carriers() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 1)], &[]))
        .await
        .unwrap();

    let by_customer = fixture
        .checkout
        .ship_order(
            &fixture.customer,
            order.id,
            ShipOrder {
                carrier_id: fixture.carrier.id,
                tracking_number: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(by_customer, CheckoutError::Domain(DomainError::Forbidden(_))));

    let to_customer = fixture
        .checkout
        .ship_order(
            &fixture.admin,
            order.id,
            ShipOrder {
                carrier_id: fixture.customer.id,
                tracking_number: None,
            },
        )
        .await
        .unwrap_err();
    let CheckoutError::Domain(DomainError::Validation(errors)) = to_customer else {
        panic!("expected validation error, got {to_customer:?}");
    };
    assert!(errors.fields().contains_key("carrier_id"));
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 1));
}

#[tokio::test]
async fn assigned_carrier_delivers() {
    let fixture = fixture().await;
    let identity = IdentityService::new(fixture.store.clone());
    let other_carrier = identity
        .register_carrier(registration("other@example.com"))
        .await
        .unwrap();
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 1)], &[]))
        .await
        .unwrap();

    let early = fixture
        .checkout
        .deliver_order(&fixture.admin, order.id)
        .await
        .unwrap_err();
    assert!(matches!(early, CheckoutError::Domain(DomainError::Order(_))));

    fixture
        .checkout
        .ship_order(
            &fixture.admin,
            order.id,
            ShipOrder {
                carrier_id: fixture.carrier.id,
                tracking_number: Some("TRACK-1".to_string()),
            },
        )
        .await
        .unwrap();

    let wrong = fixture
        .checkout
        .deliver_order(&other_carrier, order.id)
        .await
        .unwrap_err();
    assert!(matches!(wrong, CheckoutError::Domain(DomainError::Forbidden(_))));

    let delivered = fixture
        .checkout
        .deliver_order(&fixture.carrier, order.id)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.shipment.status, ShipmentStatus::Delivered);
    assert_eq!(delivered.shipment.tracking_number.as_deref(), Some("TRACK-1"));
    assert!(delivered.shipment.delivered_at.is_some());
    assert_eq!(
        delivered
            .status_history
            .iter()
            .map(|change| change.status)
            .collect::<Vec<_>>(),
        vec![OrderStatus::Placed, OrderStatus::Shipped, OrderStatus::Delivered]
    );
}

fn ship_with(fixture: &Fixture) -> ShipOrder {
    ShipOrder {
        carrier_id: fixture.carrier.id,
        tracking_number: None,
    }
}

#[tokio::test]
async fn restarted_checkout_can_cancel_and_ship_earlier_orders() {
    let fixture = fixture().await;
    let first = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 2)], &[]))
        .await
        .unwrap();
    let second = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 3)], &[]))
        .await
        .unwrap();

    let gateway = InMemoryPaymentGateway::new();
    let restarted = CheckoutCoordinator::new(fixture.store.clone(), gateway.clone());
    let third = restarted
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 1)], &[]))
        .await
        .unwrap();
    let references: BTreeSet<_> = [&first, &second, &third]
        .iter()
        .map(|o| o.payment.gateway_reference.clone())
        .collect();
    assert_eq!(references.len(), 3);

    let cancelled = restarted
        .cancel_order(&fixture.customer, first.id, None)
        .await
        .unwrap();
    assert_eq!(cancelled.payment.status, PaymentStatus::Voided);
    let shipped = restarted
        .ship_order(&fixture.admin, second.id, ship_with(&fixture))
        .await
        .unwrap();
    assert_eq!(shipped.payment.status, PaymentStatus::Captured);

    assert_eq!(
        gateway.status_of(&third.payment.gateway_reference).await,
        Some(PaymentStatus::Authorized)
    );
    assert_eq!(stock(&fixture, fixture.widget).await, (7, 1));
}

#[tokio::test]
async fn failed_ship_after_capture_can_be_retried() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(
            &fixture.customer,
            place(&fixture, &[(fixture.widget, 3), (fixture.gadget, 1)], &[]),
        )
        .await
        .unwrap();
    // Committing the gadget line fails once its reservation is gone.
    fixture.store.release_stock(fixture.gadget, 1).await.unwrap();

    let result = fixture
        .checkout
        .ship_order(&fixture.admin, order.id, ship_with(&fixture))
        .await;
    assert!(result.is_err());
    assert_eq!(
        fixture.gateway.status_of(&order.payment.gateway_reference).await,
        Some(PaymentStatus::Captured)
    );
    let stored = fixture.store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Placed);
    assert_eq!(stored.payment.status, PaymentStatus::Authorized);
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 3));
    assert_eq!(stock(&fixture, fixture.gadget).await, (1, 0));

    assert!(fixture.store.reserve_stock(fixture.gadget, 1).await.unwrap());
    let shipped = fixture
        .checkout
        .ship_order(&fixture.admin, order.id, ship_with(&fixture))
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(stock(&fixture, fixture.widget).await, (7, 0));
    assert_eq!(stock(&fixture, fixture.gadget).await, (0, 0));
}

#[tokio::test]
async fn failed_cancel_after_void_can_be_retried() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(
            &fixture.customer,
            place(&fixture, &[(fixture.widget, 3), (fixture.gadget, 1)], &[]),
        )
        .await
        .unwrap();
    fixture.store.release_stock(fixture.gadget, 1).await.unwrap();

    let result = fixture
        .checkout
        .cancel_order(&fixture.customer, order.id, None)
        .await;
    assert!(result.is_err());
    assert_eq!(
        fixture.gateway.status_of(&order.payment.gateway_reference).await,
        Some(PaymentStatus::Voided)
    );
    let stored = fixture.store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Placed);
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 3));

    assert!(fixture.store.reserve_stock(fixture.gadget, 1).await.unwrap());
    let cancelled = fixture
        .checkout
        .cancel_order(&fixture.customer, order.id, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 0));
    assert_eq!(stock(&fixture, fixture.gadget).await, (1, 0));
}

#[tokio::test]
async fn failed_capture_leaves_order_and_stock_untouched() {
    let fixture = fixture().await;
    let order = fixture
        .checkout
        .place_order(&fixture.customer, place(&fixture, &[(fixture.widget, 2)], &[]))
        .await
        .unwrap();
    fixture.gateway.set_fail_on_capture(true).await;

    let err = fixture
        .checkout
        .ship_order(&fixture.admin, order.id, ship_with(&fixture))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Gateway(_)));
    assert_eq!(stock(&fixture, fixture.widget).await, (10, 2));

    fixture.gateway.set_fail_on_capture(false).await;
    fixture
        .checkout
        .ship_order(&fixture.admin, order.id, ship_with(&fixture))
        .await
        .unwrap();
    assert_eq!(stock(&fixture, fixture.widget).await, (8, 0));
}
