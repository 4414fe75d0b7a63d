//! Order pricing: subtotal, sale and coupon discounts, shipping.
//!
//! ```text
//! total = Σ(price × qty) − min(Σ discounts, subtotal) + shipping
//! ```
//!
//! Every discount is a percentage of the subtotal of the lines it applies
//! to, rounded half up to the cent. Discounts stack additively.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, Percentage, ProductId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Coupon, CouponCode, ProductTargets, Sale};
use crate::error::ValidationErrors;

/// Maximum number of coupons on one order.
pub const MAX_COUPONS_PER_ORDER: usize = 5;

/// One priced line as seen by the pricing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingLine {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
    pub category_ids: BTreeSet<CategoryId>,
}

impl PricingLine {
    /// Unit price times quantity, or `None` if it overflows.
    pub fn total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Sale,
    Coupon,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Sale => "sale",
            DiscountKind::Coupon => "coupon",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(DiscountKind::Sale),
            "coupon" => Some(DiscountKind::Coupon),
            _ => None,
        }
    }
}

/// A discount that contributed to an order's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub kind: DiscountKind,
    /// Id of the sale or coupon.
    pub source_id: Uuid,
    /// Sale name or coupon code.
    pub label: String,
    pub percentage: Percentage,
    pub amount: Money,
}

/// Price breakdown of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Money,
    /// Sum of the discounts, capped at the subtotal.
    pub discount_total: Money,
    pub shipping: Money,
    pub total: Money,
    pub discounts: Vec<AppliedDiscount>,
}

/// Sum of the lines that match `targets`, or `None` if it overflows.
fn eligible_subtotal(lines: &[PricingLine], targets: &ProductTargets) -> Option<Money> {
    lines
        .iter()
        .filter(|line| targets.matches(line.product_id, &line.category_ids))
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.total()?))
}

fn too_large() -> ValidationErrors {
    ValidationErrors::single("items", "order amount is too large")
}

/// Prices an order.
///
/// Sales that are not running or match no line are skipped. A coupon that
/// cannot be used, or that matches no line, fails pricing with an error
/// under `coupon_codes`.
pub fn price_order(
    lines: &[PricingLine],
    sales: &[Sale],
    coupons: &[Coupon],
    shipping: Money,
    now: DateTime<Utc>,
) -> Result<OrderPricing, ValidationErrors> {
    let subtotal = lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.total()?))
        .ok_or_else(too_large)?;
    let mut discounts = Vec::new();

    for sale in sales.iter().filter(|sale| sale.is_running(now)) {
        let base = eligible_subtotal(lines, &sale.targets).ok_or_else(too_large)?;
        if base.is_positive() {
            discounts.push(AppliedDiscount {
                kind: DiscountKind::Sale,
                source_id: sale.id.as_uuid(),
                label: sale.name.clone(),
                percentage: sale.percentage,
                amount: base.percentage(sale.percentage),
            });
        }
    }

    let mut errors = ValidationErrors::new();
    for coupon in coupons {
        if let Some(reason) = coupon.rejection_reason(subtotal, now) {
            errors.add("coupon_codes", reason);
            continue;
        }
        let base = eligible_subtotal(lines, &coupon.targets).ok_or_else(too_large)?;
        if !base.is_positive() {
            errors.add(
                "coupon_codes",
                format!("coupon {} does not apply to any item", coupon.code),
            );
            continue;
        }
        discounts.push(AppliedDiscount {
            kind: DiscountKind::Coupon,
            source_id: coupon.id.as_uuid(),
            label: coupon.code.to_string(),
            percentage: coupon.percentage,
            amount: base.percentage(coupon.percentage),
        });
    }
    errors.into_result()?;

    let discount_total = Money::checked_sum(discounts.iter().map(|d| d.amount))
        .map_or(subtotal, |sum| sum.min(subtotal));
    let total = (subtotal - discount_total)
        .checked_add(shipping)
        .ok_or_else(too_large)?;

    Ok(OrderPricing {
        subtotal,
        discount_total,
        shipping,
        total,
        discounts,
    })
}

/// Parses the coupon codes of a request: at most
/// [`MAX_COUPONS_PER_ORDER`], each valid, none repeated (ignoring case).
pub fn parse_coupon_codes(codes: &[String]) -> Result<Vec<CouponCode>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if codes.len() > MAX_COUPONS_PER_ORDER {
        errors.add(
            "coupon_codes",
            format!("at most {MAX_COUPONS_PER_ORDER} coupons can be applied"),
        );
    }

    let mut seen = HashSet::new();
    let mut parsed = Vec::with_capacity(codes.len());
    for raw in codes {
        match CouponCode::parse(raw) {
            Ok(code) => {
                if seen.insert(code.clone()) {
                    parsed.push(code);
                } else {
                    errors.add("coupon_codes", format!("coupon {code} is applied more than once"));
                }
            }
            Err(e) => errors.add("coupon_codes", format!("{raw:?}: {e}")),
        }
    }
    errors.into_result()?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::ordering::{CouponInput, SaleInput};

    fn line(cents: i64, quantity: u32, categories: &[CategoryId]) -> PricingLine {
        PricingLine {
            product_id: ProductId::new(),
            unit_price: Money::from_cents(cents),
            quantity,
            category_ids: categories.iter().copied().collect(),
        }
    }

    fn pct(value: u8) -> Percentage {
        Percentage::new(value).unwrap()
    }

    fn sale(percentage: u8, targets: ProductTargets, now: DateTime<Utc>) -> Sale {
        Sale::new(
            SaleInput {
                name: format!("{percentage} off"),
                percentage: pct(percentage),
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(1),
                is_active: true,
                targets,
            },
            now,
        )
        .unwrap()
    }

    fn coupon(code: &str, percentage: u8, now: DateTime<Utc>) -> Coupon {
        Coupon::new(
            CouponInput {
                code: code.to_string(),
                percentage: pct(percentage),
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(1),
                is_active: true,
                usage_limit: None,
                min_order_amount: None,
                targets: ProductTargets::default(),
            },
            now,
        )
        .unwrap()
    }

    #[test]
    fn no_discounts() {
        let now = Utc::now();
        let lines = [line(1000, 2, &[]), line(250, 1, &[])];
        let pricing = price_order(&lines, &[], &[], Money::from_cents(500), now).unwrap();

        assert_eq!(pricing.subtotal, Money::from_cents(2250));
        assert_eq!(pricing.discount_total, Money::zero());
        assert_eq!(pricing.total, Money::from_cents(2750));
        assert!(pricing.discounts.is_empty());
    }

    #[test]
    fn sale_applies_to_matching_lines_only() {
        let now = Utc::now();
        let books = CategoryId::new();
        let lines = [line(2000, 1, &[books]), line(1000, 1, &[])];
        let targets = ProductTargets {
            included_categories: BTreeSet::from([books]),
            ..Default::default()
        };
        let pricing =
            price_order(&lines, &[sale(10, targets, now)], &[], Money::zero(), now).unwrap();

        assert_eq!(pricing.discount_total, Money::from_cents(200));
        assert_eq!(pricing.total, Money::from_cents(2800));
        assert_eq!(pricing.discounts[0].kind, DiscountKind::Sale);
    }

    #[test]
    fn sale_and_coupon_stack() {
        let now = Utc::now();
        let lines = [line(10000, 1, &[])];
        let sales = [sale(10, ProductTargets::default(), now)];
        let coupons = [coupon("EXTRA5", 5, now)];
        let pricing = price_order(&lines, &sales, &coupons, Money::from_cents(700), now).unwrap();

        assert_eq!(pricing.discount_total, Money::from_cents(1500));
        assert_eq!(pricing.total, Money::from_cents(9200));
        assert_eq!(pricing.discounts.len(), 2);
    }

    #[test]
    fn discounts_never_exceed_subtotal() {
        let now = Utc::now();
        let lines = [line(1000, 1, &[])];
        let sales = [
            sale(80, ProductTargets::default(), now),
            sale(50, ProductTargets::default(), now),
        ];
        let pricing = price_order(&lines, &sales, &[], Money::from_cents(300), now).unwrap();

        assert_eq!(pricing.discount_total, Money::from_cents(1000));
        assert_eq!(pricing.total, Money::from_cents(300));
    }

    #[test]
    fn overflowing_subtotal_is_rejected() {
        let now = Utc::now();
        let lines = [line(4_000_000_000, 4_000_000_000, &[])];
        let errors = price_order(&lines, &[], &[], Money::zero(), now).unwrap_err();
        assert!(errors.fields()["items"][0].contains("too large"));

        let lines = [line(i64::MAX, 1, &[]), line(1, 1, &[])];
        assert!(price_order(&lines, &[], &[], Money::zero(), now).is_err());
    }

    #[test]
    fn overflowing_shipping_is_rejected() {
        let now = Utc::now();
        let lines = [line(i64::MAX, 1, &[])];
        assert!(price_order(&lines, &[], &[], Money::from_cents(1), now).is_err());
    }

    #[test]
    fn sale_on_a_huge_subtotal_does_not_overflow() {
        let now = Utc::now();
        let lines = [line(25_000_000, 4_000_000_000, &[])];
        let sales = [
            sale(25, ProductTargets::default(), now),
            sale(100, ProductTargets::default(), now),
        ];
        let pricing = price_order(&lines, &sales, &[], Money::zero(), now).unwrap();

        assert_eq!(pricing.subtotal, Money::from_cents(100_000_000_000_000_000));
        assert_eq!(pricing.discounts[0].amount, Money::from_cents(25_000_000_000_000_000));
        assert_eq!(pricing.discount_total, pricing.subtotal);
        assert_eq!(pricing.total, Money::zero());
    }

    #[test]
    fn discount_rounds_half_up() {
        let now = Utc::now();
        // 15% of 3.30 = 0.495
        let lines = [line(330, 1, &[])];
        let pricing =
            price_order(&lines, &[sale(15, ProductTargets::default(), now)], &[], Money::zero(), now)
                .unwrap();
        assert_eq!(pricing.discount_total, Money::from_cents(50));
    }

    #[test]
    fn expired_sale_is_skipped() {
        let now = Utc::now();
        let lines = [line(1000, 1, &[])];
        let sales = [sale(10, ProductTargets::default(), now - Duration::days(5))];
        let pricing = price_order(&lines, &sales, &[], Money::zero(), now).unwrap();
        assert!(pricing.discounts.is_empty());
    }

    #[test]
    fn unusable_coupon_is_rejected() {
        let now = Utc::now();
        let lines = [line(1000, 1, &[])];
        let mut expensive = coupon("BIGSPENDER", 20, now);
        expensive.min_order_amount = Some(Money::from_cents(5000));

        let errors = price_order(&lines, &[], &[expensive], Money::zero(), now).unwrap_err();
        assert!(errors.fields()["coupon_codes"][0].contains("BIGSPENDER"));
    }

    #[test]
    fn coupon_matching_no_line_is_rejected() {
        let now = Utc::now();
        let lines = [line(1000, 1, &[])];
        let mut narrow = coupon("BOOKS10", 10, now);
        narrow.targets.included_categories.insert(CategoryId::new());

        let errors = price_order(&lines, &[], &[narrow], Money::zero(), now).unwrap_err();
        assert!(errors.fields()["coupon_codes"][0].contains("does not apply"));
    }

    #[test]
    fn coupon_codes_are_deduplicated_case_insensitively() {
        let codes = vec!["save10".to_string(), "SAVE10".to_string()];
        let errors = parse_coupon_codes(&codes).unwrap_err();
        assert!(errors.fields()["coupon_codes"][0].contains("more than once"));

        let parsed = parse_coupon_codes(&["save10".to_string()]).unwrap();
        assert_eq!(parsed[0].as_str(), "SAVE10");
    }

    #[test]
    fn at_most_five_coupons() {
        let codes: Vec<String> = (0..6).map(|i| format!("CODE{i}")).collect();
        assert!(parse_coupon_codes(&codes).is_err());
        assert!(parse_coupon_codes(&codes[..5]).is_ok());
    }
}
