use common::Percentage;
use domain::{PageRequest, RepositoryResult};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::{PersistenceError, corrupt};

/// PostgreSQL-backed implementation of every repository port.
#[derive(Clone)]
pub struct PostgresStore {
    pub(crate) pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `url` with a pool of at most `max_connections`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// `LIMIT` and `OFFSET` values for a page request.
pub(crate) fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.per_page()),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

pub(crate) fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

pub(crate) fn percentage(value: i16) -> RepositoryResult<Percentage> {
    u8::try_from(value)
        .ok()
        .and_then(|v| Percentage::new(v).ok())
        .ok_or_else(|| corrupt("percentage", value))
}

pub(crate) fn unsigned(what: &str, value: i64) -> RepositoryResult<u32> {
    u32::try_from(value).map_err(|_| corrupt(what, value))
}
