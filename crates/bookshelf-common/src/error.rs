//! Error types for Bookshelf

use thiserror::Error;

/// Result type alias for Bookshelf operations
pub type Result<T> = std::result::Result<T, BookshelfError>;

/// Main error type for Bookshelf
#[derive(Error, Debug)]
pub enum BookshelfError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl BookshelfError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BookshelfError::config("batch size must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Configuration error: batch size must be greater than 0"
        );

        let err = BookshelfError::parse("IMPORT_BATCH_SIZE is not a number: abc");
        assert_eq!(err.to_string(), "Parse error: IMPORT_BATCH_SIZE is not a number: abc");
    }

    #[test]
    fn test_constructors_pick_variant() {
        assert!(matches!(BookshelfError::config("x"), BookshelfError::Config(m) if m == "x"));
        assert!(matches!(BookshelfError::parse("y"), BookshelfError::Parse(m) if m == "y"));
    }
}
