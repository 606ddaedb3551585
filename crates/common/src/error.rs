//! Error types for freightcheck fixture data

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Missing required field: {field} on {record}")]
    MissingField { record: String, field: String },

    #[error("Invalid value for {field}: {value:?} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown request status label: {0}")]
    UnknownStatus(String),

    #[error("Waypoint window is inverted: {earliest} is after {latest}")]
    InvertedWindow { earliest: String, latest: String },
}
