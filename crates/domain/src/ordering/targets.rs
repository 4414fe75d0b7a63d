use std::collections::BTreeSet;

use common::{CategoryId, ProductId};
use serde::{Deserialize, Serialize};

/// Which products a sale or coupon applies to.
///
/// Exclusions always win. With both inclusion sets empty every product that
/// is not excluded qualifies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTargets {
    #[serde(default)]
    pub included_categories: BTreeSet<CategoryId>,
    #[serde(default)]
    pub excluded_categories: BTreeSet<CategoryId>,
    #[serde(default)]
    pub included_products: BTreeSet<ProductId>,
    #[serde(default)]
    pub excluded_products: BTreeSet<ProductId>,
}

impl ProductTargets {
    /// Returns true if a product with the given categories qualifies.
    pub fn matches(&self, product_id: ProductId, categories: &BTreeSet<CategoryId>) -> bool {
        if self.excluded_products.contains(&product_id)
            || !self.excluded_categories.is_disjoint(categories)
        {
            return false;
        }
        if self.included_products.is_empty() && self.included_categories.is_empty() {
            return true;
        }
        self.included_products.contains(&product_id)
            || !self.included_categories.is_disjoint(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_targets_match_everything() {
        let targets = ProductTargets::default();
        assert!(targets.matches(ProductId::new(), &BTreeSet::new()));
    }

    #[test]
    fn inclusion_by_product_or_category() {
        let product = ProductId::new();
        let category = CategoryId::new();
        let targets = ProductTargets {
            included_products: BTreeSet::from([product]),
            included_categories: BTreeSet::from([category]),
            ..Default::default()
        };

        assert!(targets.matches(product, &BTreeSet::new()));
        assert!(targets.matches(ProductId::new(), &BTreeSet::from([category])));
        assert!(!targets.matches(ProductId::new(), &BTreeSet::from([CategoryId::new()])));
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let product = ProductId::new();
        let category = CategoryId::new();
        let banned = CategoryId::new();
        let targets = ProductTargets {
            included_products: BTreeSet::from([product]),
            included_categories: BTreeSet::from([category]),
            excluded_products: BTreeSet::from([product]),
            excluded_categories: BTreeSet::from([banned]),
        };

        assert!(!targets.matches(product, &BTreeSet::new()));
        assert!(!targets.matches(ProductId::new(), &BTreeSet::from([category, banned])));
        assert!(targets.matches(ProductId::new(), &BTreeSet::from([category])));
    }
}
