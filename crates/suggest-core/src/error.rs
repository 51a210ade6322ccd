use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Insert after finalize, or query before finalize.
    #[error("Index state does not permit this operation: {0}")]
    BuildState(&'static str),

    /// A raw context value does not fit the declared dimension kind.
    #[error("Context type mismatch on dimension '{dimension}': {reason}")]
    ContextTypeMismatch { dimension: String, reason: String },

    /// An entry or query referenced a dimension the index never declared.
    #[error("Unknown context dimension: {0}")]
    UnknownDimension(String),

    /// Invalid query parameters: bad regex, fuzzy budget, size or boost.
    #[error("Invalid pattern or query parameter: {0}")]
    Pattern(String),

    /// An entry failed build-time validation (empty surface, zero weight).
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Deadline or cancellation flag triggered mid-traversal.
    #[error("Query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
