use quire_core::error::CoreError;

/// Service-level error.
///
/// Wraps [`CoreError`] for domain failures and `sqlx` errors for everything
/// the database reports.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A domain-level error from `quire_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ContentResult<T> = Result<T, ContentError>;

impl ContentError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            ContentError::Core(core) => Some(core),
            ContentError::Database(_) => None,
        }
    }

    /// Whether the database rejected a write on a unique constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ContentError::Database(err) => err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            ContentError::Core(_) => false,
        }
    }
}
