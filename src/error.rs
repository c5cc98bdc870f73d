use thiserror::Error;

pub type Result<T> = std::result::Result<T, JournalError>;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("empty input: {0}")]
    EmptyInput(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("price source error: {0}")]
    ExternalSource(String),
    #[error("chart rendering failed: {0}")]
    Render(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl JournalError {
    pub fn validation(msg: impl Into<String>) -> Self {
        JournalError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        JournalError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, JournalError::NotFound { .. })
    }
}

impl From<reqwest::Error> for JournalError {
    fn from(e: reqwest::Error) -> Self {
        JournalError::ExternalSource(e.to_string())
    }
}
