//! Errors raised by the store, auth, and record layers.
//!
//! Every variant maps to a stable wire code (see [`StoreError::code`]) so the
//! front end can branch on it without parsing messages.
use rusqlite::ErrorCode;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Permission(String),
    #[error("invalid username or password")]
    AuthFailure,
    #[error(transparent)]
    Database(rusqlite::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_params",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Permission(_) => "forbidden",
            Self::AuthFailure => "auth_failed",
            Self::Database(_) => "db_query_failed",
            Self::Hash(_) => "hash_failed",
            Self::Io(_) | Self::Csv(_) => "export_failed",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                Some(json!({ "sqliteCode": e.extended_code }))
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        // Uniqueness violations that slip past the explicit pre-checks still
        // surface as conflicts rather than generic database failures.
        match &e {
            rusqlite::Error::SqliteFailure(f, msg) if f.code == ErrorCode::ConstraintViolation => {
                let detail = msg.clone().unwrap_or_else(|| f.to_string());
                if detail.contains("CHECK") {
                    Self::Validation(detail)
                } else {
                    Self::Conflict(detail)
                }
            }
            _ => Self::Database(e),
        }
    }
}
