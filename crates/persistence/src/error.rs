use domain::RepositoryError;
use thiserror::Error;

/// Errors raised while setting up the PostgreSQL store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

/// Maps a sqlx error onto the repository error taxonomy.
///
/// Unique and check violations become `Conflict`; everything else is a
/// backend failure.
pub(crate) fn db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return RepositoryError::Conflict(conflict_message(db_err.constraint()));
            }
            Some(CHECK_VIOLATION) => {
                return RepositoryError::Conflict(format!(
                    "constraint {} rejected the write",
                    db_err.constraint().unwrap_or("check")
                ));
            }
            _ => {}
        }
    }
    tracing::error!(error = %err, "database error");
    RepositoryError::Backend(err.to_string())
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("idx_users_email") => "email is already registered".to_string(),
        Some("idx_categories_name") => "category name already exists".to_string(),
        Some("idx_coupons_code") => "coupon code already exists".to_string(),
        Some(other) => format!("duplicate value violates {other}"),
        None => "duplicate value".to_string(),
    }
}

/// Builds the error for a stored value that no longer maps onto the domain.
pub(crate) fn corrupt(what: &str, detail: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("{what}: {detail}"))
}
