//! Error types for the database core
//!
//! Zero-result and zero-affect outcomes are distinct, expected conditions
//! with their own variants so callers can match on them without string
//! inspection.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for paneldb
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    #[error("Driver '{0}' has no compiled-in connection support")]
    UnsupportedDriver(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Driver error: {0}")]
    Driver(#[from] sqlx::Error),

    #[error("No result found")]
    NoRows,

    #[error("No rows were affected")]
    NoAffectedRows,

    #[error("Missing required clause: {clause}. Add .{clause}() to your statement.")]
    MissingClause { clause: String },

    #[error("Feature not supported by {driver}: {feature}")]
    UnsupportedFeature { driver: String, feature: String },

    #[error("Decode error for column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Whether this error is an expected empty-result condition rather than
    /// a system failure.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
            || matches!(self, Self::Driver(sqlx::Error::RowNotFound))
    }
}

/// Known-benign driver messages that should not surface as errors.
///
/// sqlx reports row-not-found structurally, so only the cases that exist as
/// free-form driver text remain here. The list is matched as substrings
/// because the drivers expose no structured code for them.
pub fn is_benign_driver_error(message: &str) -> bool {
    const BENIGN: &[&str] = &[
        "no affect",
        "LastInsertId is not supported",
        "no RowsAffected available",
    ];
    BENIGN.iter().any(|needle| message.contains(needle))
}
