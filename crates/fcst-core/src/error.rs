//! Unified Error Model
use crate::stage::StageKind;
use thiserror::Error;

/// Failure reported by a remote collaborator (forecast registry or object
/// storage). The message is carried verbatim from the remote side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{service}/{operation}: {message}")]
pub struct RemoteError {
    pub service: &'static str,
    pub operation: String,
    pub message: String,
}

impl RemoteError {
    pub fn registry(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: "forecast",
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: "storage",
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("INPUT/SIZE: expected between {min} and {max} values, got {len}")]
    InvalidInputSize { len: usize, min: usize, max: usize },

    #[error("INPUT/VALUE: value at index {index} is not a finite number")]
    NonFiniteValue { index: usize },

    #[error("INPUT/ID: invalid run identity {0:?}")]
    InvalidRunIdentity(String),

    #[error("INPUT/REQUEST: {0}")]
    InvalidRequest(String),

    #[error("STAGE/PREREQUISITE: cannot start {stage}, no {prerequisite} found")]
    PrerequisiteMissing {
        stage: StageKind,
        prerequisite: StageKind,
    },

    #[error("STAGE/PREREQUISITE_FAILED: cannot start {stage}, {prerequisite} is {status}")]
    PrerequisiteFailed {
        stage: StageKind,
        prerequisite: StageKind,
        status: String,
    },

    #[error("LOOKUP/{stage}: listing failed, retry later: {source}")]
    LookupFailed {
        stage: StageKind,
        #[source]
        source: RemoteError,
    },

    #[error("RESULT/MISSING: no result object for {name}")]
    NoResultObject { name: String },

    #[error("RESULT/EMPTY: result object {key} has no rows")]
    EmptyResult { key: String },

    #[error("RESULT/PARSE: {0}")]
    ResultParse(String),

    #[error("SERIALIZE/{0}")]
    Serialize(String),

    #[error("CONFIG/{0}")]
    Config(String),

    #[error("REMOTE/{0}")]
    Remote(#[from] RemoteError),
}

impl ForecastError {
    /// Whether calling again later, unchanged, may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LookupFailed { .. } | Self::Remote(_))
    }

    /// True for errors caused by the caller's input rather than the pipeline.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInputSize { .. }
                | Self::NonFiniteValue { .. }
                | Self::InvalidRunIdentity(_)
                | Self::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
