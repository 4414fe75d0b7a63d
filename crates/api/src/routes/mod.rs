//! HTTP handlers grouped by resource.

pub mod auth;
pub mod categories;
pub mod coupons;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod sales;
pub mod shipping_methods;
pub mod users;

use domain::PageRequest;
use serde::Deserialize;

/// `page` / `per_page` query parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_query(self.page, self.per_page)
    }
}

fn default_true() -> bool {
    true
}
