//! Turns one Korean sentence into English, Japanese and a Hangul reading of
//! the Japanese.
//!
//! The first translation (Korean → English) is the primary stage: without it
//! nothing is returned. Every later stage is secondary; when one fails the
//! result still carries everything that succeeded, and the failed field holds
//! a [`SecondaryStageFailure`] instead of text.
//!
//! Three pipeline shapes are available:
//!
//! - [`PipelineShape::Combined`]: one request to the hosted model returns
//!   every field. Failure of the request fails the primary stage.
//! - [`PipelineShape::Parallel`]: Korean → English and Korean → Japanese run
//!   concurrently; once both are back, the Japanese text is sent for
//!   pronunciation.
//! - [`PipelineShape::Sequential`]: Korean → English, then English → Japanese.
//!   No pronunciation.

use crate::error::{IncompleteTranslation, SecondaryStageFailure, Stage, StageError, TranslateError};
use crate::language::Language;
use crate::record::NewSentence;
use crate::retry::{with_retry_if, RetryConfig};
use crate::translator::{CombinedTranslation, Translator};
use anyhow::bail;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-stage timeout when none is configured
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

const SOURCE: Language = Language::KOREAN;
const TARGET_A: Language = Language::ENGLISH;
const TARGET_B: Language = Language::JAPANESE;

/// How the translation stages are wired together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineShape {
    /// One request answering with both translations and the pronunciation.
    #[default]
    Combined,
    /// Both translations from the source concurrently, then pronunciation.
    Parallel,
    /// Second translation chained on the first. No pronunciation.
    Sequential,
}

impl FromStr for PipelineShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(PipelineShape::Combined),
            "parallel" => Ok(PipelineShape::Parallel),
            "sequential" => Ok(PipelineShape::Sequential),
            other => bail!(
                "Unknown pipeline shape '{}'. Expected 'combined', 'parallel' or 'sequential'",
                other
            ),
        }
    }
}

impl fmt::Display for PipelineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineShape::Combined => f.write_str("combined"),
            PipelineShape::Parallel => f.write_str("parallel"),
            PipelineShape::Sequential => f.write_str("sequential"),
        }
    }
}

/// Text of a secondary field, or the marker for why it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Ready(String),
    Failed(SecondaryStageFailure),
}

impl FieldOutcome {
    fn from_stage(stage: Stage, result: Result<String, StageError>) -> Self {
        match result {
            Ok(text) => FieldOutcome::Ready(text),
            Err(error) => {
                warn!("{} failed: {}", stage, error);
                FieldOutcome::Failed(SecondaryStageFailure { stage, error })
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            FieldOutcome::Ready(text) => Some(text),
            FieldOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SecondaryStageFailure> {
        match self {
            FieldOutcome::Ready(_) => None,
            FieldOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FieldOutcome::Ready(_))
    }
}

impl fmt::Display for FieldOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOutcome::Ready(text) => f.write_str(text),
            FieldOutcome::Failed(failure) => write!(f, "[unavailable: {}]", failure),
        }
    }
}

/// Everything one `translate` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    /// The trimmed input
    pub source_text: String,
    /// Primary translation; always present
    pub target_text_a: String,
    pub target_text_b: FieldOutcome,
    /// `None` when the pipeline has no pronunciation stage
    pub pronunciation: Option<FieldOutcome>,
}

impl TranslationResult {
    /// Markers of every secondary stage that failed.
    pub fn failures(&self) -> Vec<&SecondaryStageFailure> {
        std::iter::once(&self.target_text_b)
            .chain(self.pronunciation.as_ref())
            .filter_map(FieldOutcome::failure)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    /// Drop the pronunciation field, failed or not.
    pub fn without_pronunciation(mut self) -> Self {
        self.pronunciation = None;
        self
    }

    /// Fields ready to be saved. Fails while any field carries a failure
    /// marker.
    pub fn into_new_sentence(self) -> Result<NewSentence, IncompleteTranslation> {
        let failures: Vec<SecondaryStageFailure> =
            self.failures().into_iter().cloned().collect();
        if !failures.is_empty() {
            return Err(IncompleteTranslation { failures });
        }

        let pronunciation = self
            .pronunciation
            .and_then(|p| p.text().map(str::to_string));
        let target_text_b = self.target_text_b.text().unwrap_or_default().to_string();

        Ok(NewSentence {
            source_text: self.source_text,
            target_text_a: self.target_text_a,
            target_text_b,
            pronunciation,
        })
    }
}

/// Runs the translation pipeline against a shared [`Translator`].
///
/// Holds no per-call state, so one instance can serve any number of
/// concurrent calls.
#[derive(Clone)]
pub struct TranslationOrchestrator {
    translator: Arc<dyn Translator>,
    shape: PipelineShape,
    stage_timeout: Duration,
    retry: RetryConfig,
}

impl TranslationOrchestrator {
    pub fn new(translator: Arc<dyn Translator>, shape: PipelineShape) -> Self {
        Self {
            translator,
            shape,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            retry: RetryConfig::single_attempt(),
        }
    }

    /// Bound every attempt of every stage.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn shape(&self) -> PipelineShape {
        self.shape
    }

    /// Translate one sentence.
    ///
    /// Blank input is rejected before any request is made. Only a failure of
    /// the primary stage is returned as an error.
    pub async fn translate(&self, source_text: &str) -> Result<TranslationResult, TranslateError> {
        let source = source_text.trim();
        if source.is_empty() {
            return Err(TranslateError::InvalidInput(
                "source text is empty".to_string(),
            ));
        }

        info!(
            "Translating {} characters ({} pipeline)",
            source.chars().count(),
            self.shape
        );

        let result = match self.shape {
            PipelineShape::Combined => self.translate_combined(source).await,
            PipelineShape::Parallel => self.translate_parallel(source).await,
            PipelineShape::Sequential => self.translate_sequential(source).await,
        }?;

        if result.is_complete() {
            info!("Translation complete");
        } else {
            info!(
                "Translation finished with {} failed stage(s)",
                result.failures().len()
            );
        }
        Ok(result)
    }

    async fn translate_combined(&self, source: &str) -> Result<TranslationResult, TranslateError> {
        let CombinedTranslation {
            target_text_a,
            target_text_b,
            pronunciation,
        } = self
            .run_stage(Stage::TargetA, || self.translator.translate_all(source))
            .await
            .map_err(TranslateError::PrimaryTranslationFailure)?;

        // A reading without the Japanese text it belongs to is not kept.
        let pronunciation = match &target_text_b {
            Ok(_) => pronunciation,
            Err(_) => Err(StageError::Skipped(Stage::TargetB)),
        };

        Ok(TranslationResult {
            source_text: source.to_string(),
            target_text_a,
            target_text_b: FieldOutcome::from_stage(Stage::TargetB, target_text_b),
            pronunciation: Some(FieldOutcome::from_stage(
                Stage::Pronunciation,
                pronunciation,
            )),
        })
    }

    async fn translate_parallel(&self, source: &str) -> Result<TranslationResult, TranslateError> {
        let stage_a = self.run_stage(Stage::TargetA, || {
            self.translator.translate_to(source, SOURCE, TARGET_A)
        });
        let stage_b = self.run_stage(Stage::TargetB, || {
            self.translator.translate_to(source, SOURCE, TARGET_B)
        });
        let (result_a, result_b) = futures::future::join(stage_a, stage_b).await;

        let target_text_a = result_a.map_err(|e| {
            if result_b.is_ok() {
                debug!("Discarding secondary translation because the primary stage failed");
            }
            TranslateError::PrimaryTranslationFailure(e)
        })?;

        let pronunciation = match &result_b {
            Ok(text_b) => {
                self.run_stage(Stage::Pronunciation, || {
                    self.translator.pronounce(text_b, TARGET_B)
                })
                .await
            }
            Err(_) => Err(StageError::Skipped(Stage::TargetB)),
        };

        Ok(TranslationResult {
            source_text: source.to_string(),
            target_text_a,
            target_text_b: FieldOutcome::from_stage(Stage::TargetB, result_b),
            pronunciation: Some(FieldOutcome::from_stage(
                Stage::Pronunciation,
                pronunciation,
            )),
        })
    }

    async fn translate_sequential(
        &self,
        source: &str,
    ) -> Result<TranslationResult, TranslateError> {
        let target_text_a = self
            .run_stage(Stage::TargetA, || {
                self.translator.translate_to(source, SOURCE, TARGET_A)
            })
            .await
            .map_err(TranslateError::PrimaryTranslationFailure)?;

        let result_b = self
            .run_stage(Stage::TargetB, || {
                self.translator.translate_to(&target_text_a, TARGET_A, TARGET_B)
            })
            .await;

        Ok(TranslationResult {
            source_text: source.to_string(),
            target_text_b: FieldOutcome::from_stage(Stage::TargetB, result_b),
            target_text_a,
            pronunciation: None,
        })
    }

    /// One stage with timeout and retry applied to each attempt.
    async fn run_stage<T, F, Fut>(&self, stage: Stage, call: F) -> Result<T, StageError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let timeout = self.stage_timeout;
        let result = with_retry_if(
            &self.retry,
            &stage.to_string(),
            || {
                let attempt = call();
                async move {
                    tokio::time::timeout(timeout, attempt)
                        .await
                        .unwrap_or(Err(StageError::Timeout(timeout)))
                }
            },
            StageError::is_retryable,
        )
        .await;

        if result.is_ok() {
            debug!("{} succeeded", stage);
        }
        result
    }
}

impl fmt::Debug for TranslationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationOrchestrator")
            .field("shape", &self.shape)
            .field("stage_timeout", &self.stage_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
