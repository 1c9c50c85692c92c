use thiserror::Error;

/// Validation and contract errors exposed by `lookthru-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("identifier cannot be empty")]
    EmptyIdentifier,
    #[error("identifier length {len} must be 12")]
    IdentifierLength { len: usize },
    #[error("identifier country code must be two ASCII letters: '{value}'")]
    IdentifierCountryCode { value: String },
    #[error("identifier body contains invalid character '{ch}' at index {index}")]
    IdentifierBody { ch: char, index: usize },
    #[error("identifier check digit must be numeric: '{ch}'")]
    IdentifierCheckDigit { ch: char },
    #[error("identifier checksum mismatch: '{value}'")]
    ChecksumMismatch { value: String },
    #[error("identifier is a placeholder sentinel: '{value}'")]
    PlaceholderIdentifier { value: String },

    #[error("weight_percentage {value} outside [0, 150]")]
    WeightOutOfRange { value: f64 },
    #[error("confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange { value: f64 },
    #[error("quantity must be non-negative: {value}")]
    NegativeQuantity { value: f64 },
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },

    #[error("ttl_hours is required for status '{status}'")]
    MissingTtl { status: String },
    #[error("unknown resolution status '{value}'")]
    UnknownStatus { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Warehouse(#[from] lookthru_warehouse::WarehouseError),
}
