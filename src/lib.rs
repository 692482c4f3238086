//! Conversify: translate everyday Korean sentences into English and Japanese
//! and keep them in a personal phrasebook.
//!
//! - [`orchestrator`] runs the translation pipeline with partial-failure handling.
//! - [`store`] keeps saved sentences, written through to a [`storage`] medium.

pub mod config;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod record;
pub mod retry;
pub mod storage;
pub mod store;
pub mod translator;

pub use error::{
    IncompleteTranslation, SecondaryStageFailure, Stage, StageError, StorageError, StoreError,
    TranslateError,
};
pub use language::Language;
pub use orchestrator::{FieldOutcome, PipelineShape, TranslationOrchestrator, TranslationResult};
pub use record::{NewSentence, SentencePatch, SentenceRecord};
pub use storage::{DurableMedium, JsonFileStorage, MemoryStorage};
pub use store::{SentenceStore, SubscriptionId};
pub use translator::{CombinedTranslation, HttpTranslator, Translator};
