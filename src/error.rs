use thiserror::Error;

use crate::db::DbError;
use crate::hotkey::HotkeyError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
    #[error("snippet {0} not found")]
    NotFound(i64),
    #[error("malformed {field}: {reason}")]
    MalformedState { field: &'static str, reason: String },
    #[error("database busy after {attempts} attempts")]
    Contention { attempts: u32 },
    #[error("hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),
    #[error("highlight error: {0}")]
    Highlight(String),
    #[error("database error: {0}")]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Contention { attempts } => StoreError::Contention { attempts },
            DbError::Malformed { field, reason } => StoreError::MalformedState { field, reason },
            other => StoreError::Db(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
