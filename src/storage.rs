//! Durable media for the sentence collection.
//!
//! A medium holds the whole collection under one namespaced key and is always
//! rewritten in full. The stored document uses the same envelope as the
//! original web client so existing exports load unchanged:
//!
//! ```json
//! {"state": {"sentences": [...]}, "version": 0}
//! ```

use crate::error::StorageError;
use crate::record::SentenceRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default namespaced key of the collection.
pub const DEFAULT_STORE_KEY: &str = "sentence-storage";

const STORAGE_VERSION: u32 = 0;

/// Somewhere the sentence collection survives a restart.
pub trait DurableMedium: Send {
    /// Load the stored collection. Nothing stored yet is `Ok(vec![])`.
    fn load(&self) -> Result<Vec<SentenceRecord>, StorageError>;

    /// Replace the stored collection.
    fn save(&self, sentences: &[SentenceRecord]) -> Result<(), StorageError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    state: StateRef<'a>,
    version: u32,
}

#[derive(Serialize)]
struct StateRef<'a> {
    sentences: &'a [SentenceRecord],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Envelope { state: StoredState },
    Bare(Vec<SentenceRecord>),
}

#[derive(Deserialize)]
struct StoredState {
    #[serde(default)]
    sentences: Vec<SentenceRecord>,
}

/// Serialize a collection into the persisted envelope.
pub fn encode(sentences: &[SentenceRecord]) -> Result<String, StorageError> {
    let envelope = EnvelopeRef {
        state: StateRef { sentences },
        version: STORAGE_VERSION,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse a persisted document. Accepts the envelope or a bare array.
pub fn decode(text: &str) -> Result<Vec<SentenceRecord>, StorageError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<StoredDocument>(text) {
        Ok(StoredDocument::Envelope { state }) => Ok(state.sentences),
        Ok(StoredDocument::Bare(sentences)) => Ok(sentences),
        Err(e) => Err(StorageError::Malformed(e.to_string())),
    }
}

/// JSON file at `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DurableMedium for JsonFileStorage {
    fn load(&self) -> Result<Vec<SentenceRecord>, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored sentences at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        decode(&text)
    }

    fn save(&self, sentences: &[SentenceRecord]) -> Result<(), StorageError> {
        let text = encode(sentences)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        // Write the whole document aside, then swap it in.
        let temp = self.temp_path();
        fs::write(&temp, text).map_err(|source| StorageError::Write {
            path: temp.clone(),
            source,
        })?;
        fs::rename(&temp, &self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(
            "Saved {} sentences to {}",
            sentences.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-process medium holding the serialized document.
///
/// Clones share the same slot, so a test can keep a handle while the store
/// owns another and reopen a fresh store over the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-serialized document.
    pub fn with_contents(text: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(text.into()))),
        }
    }

    /// The raw stored document, if anything has been saved.
    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl DurableMedium for MemoryStorage {
    fn load(&self) -> Result<Vec<SentenceRecord>, StorageError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| StorageError::Unavailable("memory slot poisoned".to_string()))?;
        match slot.as_deref() {
            Some(text) => decode(text),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, sentences: &[SentenceRecord]) -> Result<(), StorageError> {
        let text = encode(sentences)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| StorageError::Unavailable("memory slot poisoned".to_string()))?;
        *slot = Some(text);
        Ok(())
    }
}
