//! Error types shared by the orchestrator and the sentence store.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A step of the translation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Source text into the first target language. Required.
    TargetA,
    /// Second target language, either from the source or chained from A.
    TargetB,
    /// Phonetic reading of the second target language.
    Pronunciation,
}

impl Stage {
    /// Whether a failure of this stage aborts the whole translation.
    pub fn is_primary(&self) -> bool {
        matches!(self, Stage::TargetA)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::TargetA => f.write_str("primary translation"),
            Stage::TargetB => f.write_str("secondary translation"),
            Stage::Pronunciation => f.write_str("pronunciation"),
        }
    }
}

/// Why a single call to the translation service failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("service responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service returned an empty result")]
    Empty,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("not attempted because the {0} failed")]
    Skipped(Stage),
}

impl StageError {
    /// Network errors, timeouts, 429 and 5xx are transient.
    /// Other 4xx, malformed and empty responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StageError::Network(_) | StageError::Timeout(_) => true,
            StageError::Status { status, .. } => *status == 429 || *status >= 500,
            StageError::Malformed(_) | StageError::Empty | StageError::Skipped(_) => false,
        }
    }
}

/// Failure of a non-essential stage. Carried inside a translation result as
/// the marker for the affected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {error}")]
pub struct SecondaryStageFailure {
    pub stage: Stage,
    pub error: StageError,
}

/// Errors that abort a whole `translate` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("primary translation failed: {0}")]
    PrimaryTranslationFailure(StageError),
}

/// A translation result that still carries failure markers cannot be saved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("translation is incomplete: {}", describe_failures(.failures))]
pub struct IncompleteTranslation {
    pub failures: Vec<SecondaryStageFailure>,
}

fn describe_failures(failures: &[SecondaryStageFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the durable medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("stored sentences are malformed: {0}")]
    Malformed(String),

    #[error("failed to serialize sentences: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from sentence store mutations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("could not persist sentences: {0}")]
    Storage(#[from] StorageError),
}
