//! PostgreSQL persistence for the shop backend.
//!
//! [`PostgresStore`] implements every repository port from the domain crate
//! with sqlx runtime queries. Aggregate writes run in a single transaction
//! that upserts the root row and replaces its owned collections. Stock and
//! coupon counters change through guarded `UPDATE` statements only.

mod catalog;
mod error;
mod orders;
mod promotions;
mod store;
mod users;

pub use error::PersistenceError;
pub use store::PostgresStore;
