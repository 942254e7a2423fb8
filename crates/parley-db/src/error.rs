use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A UNIQUE constraint rejected the write (taken username or handle).
    #[error("conflicting row already exists")]
    Conflict,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl DbError {
    /// The schema's UNIQUE constraints are the single arbiter for handle
    /// collisions; writers insert blindly and fold the constraint failure
    /// into [`DbError::Conflict`] here.
    pub(crate) fn on_insert(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            DbError::Conflict
        } else {
            DbError::Sqlite(err)
        }
    }
}
