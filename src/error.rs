use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// A path segment, index, or unique id did not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O errors from reading or writing category files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted folder file that cannot be parsed back.
    #[error("Malformed folder file at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// The record file could not be (de)serialized.
    #[error("Record file error: {0}")]
    Record(#[from] serde_json::Error),

    /// Invalid name or command provided by the user.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        AppError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
