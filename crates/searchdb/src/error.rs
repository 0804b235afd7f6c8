use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SearchDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Pattern syntax error: {0}")]
    PatternSyntax(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SearchDbError>;
