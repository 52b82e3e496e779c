//! Error types for the dashboard core.
//!
//! Each layer has its own error enum; [`Error`] is the umbrella the reactive
//! view graph stores when a computation fails.

use crate::column::ColumnType;
use crate::table::Field;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failure to produce the base table. Fatal at startup.
#[derive(Debug, Error)]
pub enum DataLoadError {
    /// Input file does not exist.
    #[error("data file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be opened or read.
    #[error("failed to read data file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the input (bad header, bad quoting, I/O).
    #[error("failed to parse CSV: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    /// A data row could not be converted into a country record.
    #[error("line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A required column is absent from the header.
    #[error("required column '{column}' not found")]
    MissingColumn { column: Field },

    /// A numeric column has rows but not a single present value to impute from.
    #[error("column '{column}' has no values to compute a mean from")]
    NoValues { column: Field },
}

/// Structural errors raised by [`crate::Table`] accessors and constructors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("column '{0}' not found")]
    MissingColumn(Field),

    #[error("column '{field}' holds {actual:?} values, expected {expected:?}")]
    TypeMismatch {
        field: Field,
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("column '{field}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        field: Field,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(Field),

    #[error("row {row} out of range [0, {len})")]
    RowOutOfRange { row: usize, len: usize },
}

/// Errors from the statistics module.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Statistics were requested over zero values (the `EmptyInputError` kind).
    #[error("no values in column '{field}'")]
    EmptyInput { field: Field },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Errors from the clustering adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("cluster count must be at least 1, got {k}")]
    InvalidClusterCount { k: usize },

    #[error("cannot form {k} clusters from {rows} rows")]
    TooFewRows { rows: usize, k: usize },

    #[error("column '{field}' has no values to impute from")]
    NoValues { field: Field },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// A presentation adapter could not build its chart or table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecBuildError {
    #[error("{panel}: {source}")]
    Column {
        panel: &'static str,
        #[source]
        source: TableError,
    },

    #[error("{panel}: {source}")]
    Statistics {
        panel: &'static str,
        #[source]
        source: StatsError,
    },
}

/// Invalid process configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a port number, got '{value}'")]
    InvalidPort { name: &'static str, value: String },
}

/// A view's computation failed. Cloned out of the view's cache slot on every
/// read until one of its dependencies changes.
#[derive(Debug, Clone, Error)]
#[error("view '{view}' failed: {source}")]
pub struct ViewError {
    view: String,
    #[source]
    source: Arc<Error>,
}

impl ViewError {
    pub fn new(view: impl Into<String>, source: Error) -> Self {
        ViewError {
            view: view.into(),
            source: Arc::new(source),
        }
    }

    /// Name of the view that failed.
    pub fn view(&self) -> &str {
        &self.view
    }

    /// The underlying cause.
    pub fn cause(&self) -> &Error {
        &self.source
    }

    /// Follows nested upstream view failures down to the first non-view cause.
    pub fn root_cause(&self) -> &Error {
        let mut current = self.source.as_ref();
        while let Error::View(inner) = current {
            current = inner.source.as_ref();
        }
        current
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    SpecBuild(#[from] SpecBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("view '{view}' read '{dependency}', which it did not declare as a dependency")]
    UndeclaredDependency { view: String, dependency: String },

    #[error("dependency '{0}' holds a value of a different type")]
    DependencyType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_views() {
        let inner = ViewError::new(
            "filtered",
            Error::Cluster(ClusterError::InvalidClusterCount { k: 0 }),
        );
        let outer = ViewError::new("clustered", Error::View(inner));

        assert_eq!(outer.view(), "clustered");
        assert!(matches!(
            outer.root_cause(),
            Error::Cluster(ClusterError::InvalidClusterCount { k: 0 })
        ));
        assert!(outer.to_string().contains("view 'filtered' failed"));
    }

    #[test]
    fn test_error_messages_name_the_column() {
        let err = DataLoadError::MissingColumn {
            column: Field::Corruption,
        };
        assert_eq!(
            err.to_string(),
            "required column 'Perceptions of corruption' not found"
        );
    }
}
