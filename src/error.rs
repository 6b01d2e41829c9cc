// 🚨 Errors & Anomalies
// Fatal errors abort a stage; anomalies are collected and reported alongside results

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// FATAL ERRORS
// ============================================================================

/// All errors produced by the inventory pipeline.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// A source record lacks a column the field mapping requires.
    /// `ordinal` is the 1-based position of the record in the input.
    #[error("Record {ordinal} is missing required field '{field}'")]
    RecordShape { field: String, ordinal: usize },

    /// A ratio was requested over an empty denominator.
    #[error("Cannot compute {metric}: dataset has no {denominator}")]
    EmptyDataset {
        metric: String,
        denominator: String,
    },

    /// The alias table maps one spelling to two different canonical terms.
    #[error("Alias conflict on field '{field}': '{alternate}' maps to both '{first}' and '{second}'")]
    AliasConflict {
        field: String,
        alternate: String,
        first: String,
        second: String,
    },

    /// The field mapping has no entry for a column the pipeline needs.
    #[error("Field mapping has no column named '{0}'")]
    MissingMapping(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Unknown column '{column}' in table {table}")]
    UnknownColumn { table: String, column: String },

    /// A row handed to a bulk insert does not match its column list.
    #[error("Row {row} for table {table} has {found} values, expected {expected}")]
    RowWidth {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl InventoryError {
    pub fn empty_dataset(metric: &str, denominator: &str) -> Self {
        InventoryError::EmptyDataset {
            metric: metric.to_string(),
            denominator: denominator.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;

// ============================================================================
// NON-FATAL ANOMALIES
// ============================================================================

/// A categorical value outside the tracked set. Bucketed, never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnrecognizedTermWarning {
    pub field: String,
    pub term: String,
    pub occurrences: i64,
}

impl std::fmt::Display for UnrecognizedTermWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unrecognized {} '{}' ({} occurrences)",
            self.field, self.term, self.occurrences
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataAnomaly {
    UnrecognizedTerm(UnrecognizedTermWarning),

    /// Equipment rows recorded without a room.
    MissingLocation {
        district: String,
        facility_name: String,
        items: i64,
    },

    /// One (district, facility name) recorded under several facility types;
    /// each type is counted as its own facility.
    MixedFacilityType {
        district: String,
        facility_name: String,
        types: Vec<String>,
    },
}

impl std::fmt::Display for DataAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataAnomaly::UnrecognizedTerm(warning) => write!(f, "{}", warning),
            DataAnomaly::MissingLocation {
                district,
                facility_name,
                items,
            } => write!(
                f,
                "{} item(s) at '{}' ({}) have no location",
                items, facility_name, district
            ),
            DataAnomaly::MixedFacilityType {
                district,
                facility_name,
                types,
            } => write!(
                f,
                "'{}' ({}) is recorded under {} facility types: {}",
                facility_name,
                district,
                types.len(),
                types.join(", ")
            ),
        }
    }
}
