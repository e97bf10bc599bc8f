use thiserror::Error;

/// Failure talking to the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write; carries the constraint name when the
    /// server reported one.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The pool could not hand out a connection or the socket failed.
    #[error("database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// True when the violated constraint name mentions `column`.
    pub fn violates(&self, column: &str) -> bool {
        match self {
            Self::UniqueViolation { constraint } => constraint.contains(column),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::UniqueViolation {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }

        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err)
            }
            other => Self::Database(other),
        }
    }
}
