use thiserror::Error;

/// Main error type for chflat
#[derive(Error, Debug)]
pub enum ChflatError {
    /// Source table or connection missing or unreachable
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Uploaded file is not a recognized delimited-text type
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Selection references a column the schema does not have
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    /// Destination table creation failed
    #[error("DDL error: {0}")]
    Ddl(String),

    /// Reading rows from the source table failed
    #[error("Source query error: {0}")]
    SourceQuery(String),

    /// Malformed record in a flat file
    #[error("Parse error: {0}")]
    Parse(String),

    /// A batch write failed
    #[error("Write error: {0}")]
    Write(String),

    /// Existing destination table lacks projected columns
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport errors talking to the database
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error reported by the database server
    #[error("Database error: {0}")]
    Database(String),
}

/// Convenient Result type using ChflatError
pub type Result<T> = std::result::Result<T, ChflatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChflatError::InvalidColumn("postcode".to_string());
        assert!(err.to_string().contains("Invalid column"));
        assert!(err.to_string().contains("postcode"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let chflat_err: ChflatError = io_err.into();
        assert!(matches!(chflat_err, ChflatError::Io(_)));
    }

    #[test]
    fn test_parse_error_keeps_context() {
        let err = ChflatError::Parse("line 3: found record with 2 fields".to_string());
        assert_eq!(err.to_string(), "Parse error: line 3: found record with 2 fields");
    }
}
