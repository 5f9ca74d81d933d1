use thiserror::Error;

/// Main error type for feature extraction, training and hyperparameter search
#[derive(Error, Debug)]
pub enum LobError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown feature weights preset: {0}")]
    UnknownFeatureWeights(String),

    // Serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Event table errors
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} has wrong type, expected {expected}")]
    ColumnType { column: String, expected: String },

    #[error("Column {column} has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    // Feature transform errors
    #[error("Transform failed: {0}")]
    Transform(String),

    // RL errors
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for LobError
pub type Result<T> = std::result::Result<T, LobError>;

impl LobError {
    /// Shorthand for a missing column error
    pub fn missing_column(name: impl Into<String>) -> Self {
        LobError::MissingColumn(name.into())
    }

    /// Shorthand for a column type error
    pub fn column_type(column: impl Into<String>, expected: impl Into<String>) -> Self {
        LobError::ColumnType {
            column: column.into(),
            expected: expected.into(),
        }
    }
}
