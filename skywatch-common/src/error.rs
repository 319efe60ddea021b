//! Common error types for skywatch

use thiserror::Error;

/// Common result type for skywatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across skywatch crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert_with_question_mark() {
        fn open_missing() -> Result<()> {
            std::fs::read_to_string("/nonexistent/skywatch.toml")?;
            Ok(())
        }

        let err = open_missing().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error:"));
    }
}
