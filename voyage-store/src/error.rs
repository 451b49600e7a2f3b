use voyage_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(sqlx::Error::Database(db))
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                CoreError::Conflict(db.message().to_string())
            }
            StoreError::Corrupt(msg) => CoreError::InternalError(msg),
            other => CoreError::StorageError(other.to_string()),
        }
    }
}

/// Shorthand for repository methods, which speak `CoreError`.
pub(crate) fn db(err: sqlx::Error) -> CoreError {
    StoreError::Database(err).into()
}
