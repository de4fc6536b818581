//! Error types for workload table queries

use thiserror::Error;

/// Failure to turn a template into a concrete query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("Unknown variable '${0}'")]
    Unknown(String),

    #[error("Variable '{0}' has no resolved value")]
    Unresolved(String),

    #[error("Variable '{0}' is constant")]
    Constant(String),
}

/// Errors produced while executing queries against a datasource
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown datasource '{0}'")]
    UnknownDatasource(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Datasource returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Query '{ref_id}' failed ({error_type}): {error}")]
    Api {
        ref_id: String,
        error_type: String,
        error: String,
    },

    #[error("Unexpected response for query '{ref_id}': {reason}")]
    Decode { ref_id: String, reason: String },

    #[error(transparent)]
    Variable(#[from] VariableError),
}
