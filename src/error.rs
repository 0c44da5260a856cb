use thiserror::Error;

/// A rejected field assignment. `Display` renders the message alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    pub const fn new(field: &'static str, message: &'static str) -> Self {
        ValidationError { field, message }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("{table} record {id} not found")]
    NotFound { table: &'static str, id: i64 },

    #[error("migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

/// A stored column that fails its field validation when loaded.
pub(crate) fn invalid_column(column: &str, err: ValidationError) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::ColumnDecode { source, .. } = &err {
            if let Some(invalid) = source.downcast_ref::<ValidationError>() {
                return Error::Validation(invalid.clone());
            }
        }
        let fk_violation = err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_foreign_key_violation());
        if fk_violation {
            Error::Integrity(err.to_string())
        } else {
            Error::Database(err)
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
