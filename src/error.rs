//! Error types for rankrun
//!
//! Configuration errors surface before any I/O. Coordination errors are fatal
//! for the whole group; nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// rankrun error types
#[derive(Error, Debug)]
pub enum Error {
    /// A column name was declared twice
    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    /// A user column collides with a column the harness owns
    #[error("the column name '{0}' is reserved")]
    ReservedColumn(String),

    /// Harness configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An argument mapping names a field the run arguments do not have
    #[error("argument '{0}' is not present in the run arguments")]
    UnknownArgument(String),

    /// Runner returned a different number of values than return mappings
    #[error("runner returned {got} values but {expected} return mappings were declared")]
    OutputArity {
        /// Declared return mappings
        expected: usize,
        /// Values the runner produced
        got: usize,
    },

    /// Existing table was written with a different column list
    #[error("the columns of {}, {found:?}, do not match expected {expected:?}", .path.display())]
    SchemaMismatch {
        /// Table file
        path: PathBuf,
        /// Columns found in the file
        found: Vec<String>,
        /// Columns the caller declared
        expected: Vec<String>,
    },

    /// Experiment directory was created by an earlier run
    #[error("{} already exists - cannot proceed safely", .0.display())]
    AlreadyExists(PathBuf),

    /// A leader-only step failed; followers see the leader's message
    #[error("leader failed during {step}: {message}")]
    LeaderFailed {
        /// Step the leader was performing
        step: String,
        /// Leader-side error message
        message: String,
    },

    /// Barrier/broadcast transport failure or lockstep divergence
    #[error("coordination failure: {0}")]
    Coordination(String),

    /// The user-supplied runner failed
    #[error("runner failed: {0:#}")]
    Runner(anyhow::Error),

    /// Failed to encode a value for broadcast
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a broadcast value
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the one error the table fallback policy recovers from
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Error::SchemaMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_message_lists_both_column_sets() {
        let err = Error::SchemaMismatch {
            path: PathBuf::from("results/table.csv"),
            found: vec!["b".into(), "a".into()],
            expected: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("results/table.csv"));
        assert!(msg.contains("[\"b\", \"a\"]"));
        assert!(msg.contains("[\"a\", \"b\"]"));
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_already_exists_names_path() {
        let err = Error::AlreadyExists(PathBuf::from("results/0.1-3"));
        assert_eq!(err.to_string(), "results/0.1-3 already exists - cannot proceed safely");
        assert!(!err.is_schema_mismatch());
    }

    #[test]
    fn test_runner_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("writing checkpoint");
        let err = Error::Runner(inner);
        assert_eq!(err.to_string(), "runner failed: writing checkpoint: disk full");
    }
}
