use crate::types::{Country, Gender, Indicator};
use std::path::PathBuf;
use thiserror::Error;

/// Malformed or missing backing data.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected header {found:?}, expected {expected:?}")]
    Header {
        found: Vec<String>,
        expected: Vec<&'static str>,
    },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {field} {value:?}: {reason}")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{context}: value {value} outside [0, 100]")]
    OutOfRange { context: String, value: f64 },

    #[error("duplicate observation for {country} {year} {indicator} ({gender})")]
    Duplicate {
        country: Country,
        year: u16,
        indicator: Indicator,
        gender: Gender,
    },

    #[error("no observations loaded from {0}")]
    Empty(String),
}

/// Lookup of a name that is absent from the reference data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {name:?}")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub name: String,
}

impl NotFoundError {
    pub fn country(name: impl Into<String>) -> Self {
        Self {
            kind: "country",
            name: name.into(),
        }
    }

    pub fn indicator(name: impl Into<String>) -> Self {
        Self {
            kind: "indicator",
            name: name.into(),
        }
    }

    pub fn gender(name: impl Into<String>) -> Self {
        Self {
            kind: "gender",
            name: name.into(),
        }
    }

    /// A known country that has no entry in the location table.
    pub fn location(name: impl Into<String>) -> Self {
        Self {
            kind: "location for country",
            name: name.into(),
        }
    }
}

/// Failure while writing a query result as CSV.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
