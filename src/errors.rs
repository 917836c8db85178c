use thiserror::Error;

#[derive(Debug, Error)]
pub enum UndoGraphError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("codec error: {0}")]
    CodecError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Internal marker for an idempotent re-save. The transaction bracket
    /// rolls back and absorbs it; callers never observe this variant.
    #[error("no change")]
    NoChange,
}

impl UndoGraphError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        UndoGraphError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        UndoGraphError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        UndoGraphError::QueryError(msg.into())
    }

    pub fn codec<T: Into<String>>(msg: T) -> Self {
        UndoGraphError::CodecError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        UndoGraphError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        UndoGraphError::InvalidInput(msg.into())
    }
}
