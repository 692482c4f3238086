//! Durable, observable collection of saved sentences.
//!
//! The store owns the collection and a [`DurableMedium`]. Every mutation
//! rewrites the whole collection to the medium before listeners are told about
//! it; when the write fails the mutation is undone and the error returned.

use crate::error::{StorageError, StoreError};
use crate::record::{NewSentence, SentencePatch, SentenceRecord};
use crate::storage::DurableMedium;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle returned by [`SentenceStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&[SentenceRecord]) + Send>;

pub struct SentenceStore {
    sentences: Vec<SentenceRecord>,
    medium: Box<dyn DurableMedium>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl SentenceStore {
    /// Open a store over `medium`, loading whatever it holds.
    ///
    /// Unreadable or malformed data is logged and treated as an empty
    /// collection; the next successful mutation overwrites it. Records that
    /// share an id with an earlier record get a fresh one, and the repaired
    /// collection is written back.
    pub fn open(medium: impl DurableMedium + 'static) -> Self {
        let mut sentences = match medium.load() {
            Ok(sentences) => {
                info!("Loaded {} saved sentences", sentences.len());
                sentences
            }
            Err(e) => {
                warn!("Could not load saved sentences, starting empty: {}", e);
                Vec::new()
            }
        };

        let reassigned = reassign_duplicate_ids(&mut sentences);
        let store = Self {
            sentences,
            medium: Box::new(medium),
            listeners: Vec::new(),
            next_subscription: 0,
        };
        if reassigned > 0 {
            // A failed write is already logged; the next mutation retries it.
            let _ = store.persist();
        }
        store
    }

    /// Saved sentences, newest first.
    pub fn list(&self) -> &[SentenceRecord] {
        &self.sentences
    }

    pub fn get(&self, id: &str) -> Option<&SentenceRecord> {
        self.sentences.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Save a new sentence at the front of the collection.
    pub fn create(&mut self, fields: NewSentence) -> Result<SentenceRecord, StoreError> {
        if let Some(field) = fields.first_blank_field() {
            return Err(StoreError::InvalidInput(format!("{} must not be empty", field)));
        }

        let record = SentenceRecord {
            id: self.fresh_id(),
            created_at: Utc::now(),
            source_text: fields.source_text,
            target_text_a: fields.target_text_a,
            target_text_b: fields.target_text_b,
            pronunciation: fields.pronunciation,
        };

        self.sentences.insert(0, record.clone());
        if let Err(e) = self.persist() {
            self.sentences.remove(0);
            return Err(e.into());
        }

        debug!("Created sentence {}", record.id);
        self.notify();
        Ok(record)
    }

    /// Merge `patch` into the sentence with `id`. Unknown ids are ignored.
    pub fn update(&mut self, id: &str, patch: SentencePatch) -> Result<(), StoreError> {
        let Some(index) = self.position(id) else {
            debug!("Update ignored, no sentence {}", id);
            return Ok(());
        };

        if let Some(field) = patch.first_blank_field() {
            return Err(StoreError::InvalidInput(format!("{} must not be empty", field)));
        }

        let previous = self.sentences[index].clone();
        patch.apply_to(&mut self.sentences[index]);
        if let Err(e) = self.persist() {
            self.sentences[index] = previous;
            return Err(e.into());
        }

        debug!("Updated sentence {}", id);
        self.notify();
        Ok(())
    }

    /// Remove the sentence with `id`. Unknown ids are ignored.
    pub fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let Some(index) = self.position(id) else {
            debug!("Delete ignored, no sentence {}", id);
            return Ok(());
        };

        let removed = self.sentences.remove(index);
        if let Err(e) = self.persist() {
            self.sentences.insert(index, removed);
            return Err(e.into());
        }

        debug!("Deleted sentence {}", id);
        self.notify();
        Ok(())
    }

    /// Register a listener called with the full collection after every
    /// committed mutation.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&[SentenceRecord]) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether the listener was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sentences.iter().position(|s| s.id == id)
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.medium.save(&self.sentences).map_err(|e| {
            warn!("Failed to persist saved sentences: {}", e);
            e
        })
    }

    fn notify(&mut self) {
        let snapshot = &self.sentences;
        for (_, listener) in self.listeners.iter_mut() {
            listener(snapshot);
        }
    }
}

/// Give every record whose id was already seen a fresh one. Returns how many
/// were changed.
fn reassign_duplicate_ids(sentences: &mut [SentenceRecord]) -> usize {
    let mut seen = HashSet::new();
    let mut reassigned = 0;
    for index in 0..sentences.len() {
        if seen.insert(sentences[index].id.clone()) {
            continue;
        }
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !seen.contains(&candidate) && sentences.iter().all(|s| s.id != candidate) {
                break candidate;
            }
        };
        warn!(
            "Saved sentence id {} is used more than once, reassigned as {}",
            sentences[index].id, id
        );
        seen.insert(id.clone());
        sentences[index].id = id;
        reassigned += 1;
    }
    reassigned
}

impl std::fmt::Debug for SentenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceStore")
            .field("sentences", &self.sentences.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    // ==================== Helper Functions ====================

    /// Medium whose writes can be switched off mid-test.
    #[derive(Clone, Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_writes: Arc<AtomicBool>,
    }

    impl DurableMedium for FlakyStorage {
        fn load(&self) -> Result<Vec<SentenceRecord>, StorageError> {
            self.inner.load()
        }

        fn save(&self, sentences: &[SentenceRecord]) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("quota exceeded".to_string()));
            }
            self.inner.save(sentences)
        }
    }

    fn greeting() -> NewSentence {
        NewSentence::new("안녕하세요", "Hello", "こんにちは").with_pronunciation("곤니치와")
    }

    fn numbered(n: usize) -> NewSentence {
        NewSentence::new(
            format!("문장 {}", n),
            format!("Sentence {}", n),
            format!("文 {}", n),
        )
    }

    // ==================== Open Tests ====================

    #[test]
    fn test_open_empty_medium() {
        let store = SentenceStore::open(MemoryStorage::new());
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_open_malformed_medium_starts_empty() {
        let store = SentenceStore::open(MemoryStorage::with_contents("{{{"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_data_is_overwritten_by_next_mutation() {
        let medium = MemoryStorage::with_contents("not json");
        let mut store = SentenceStore::open(medium.clone());
        store.create(greeting()).expect("create");

        let reopened = SentenceStore::open(medium);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_open_reassigns_duplicate_ids() {
        let medium = MemoryStorage::with_contents(
            r#"{"state":{"sentences":[
                {"id":"2024-01-12T10:00:00.000Z","korean":"하나","english":"One","japanese":"一つ","createdAt":"2024-01-12T10:00:00.000Z"},
                {"id":"2024-01-12T10:00:00.000Z","korean":"둘","english":"Two","japanese":"二つ","createdAt":"2024-01-12T10:00:00.000Z"}
            ]},"version":0}"#,
        );
        let mut store = SentenceStore::open(medium.clone());

        let ids: HashSet<_> = store.list().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.list()[0].id, "2024-01-12T10:00:00.000Z");
        assert_eq!(store.list()[0].target_text_a, "One");

        // The repaired ids are durable and each record is addressable alone
        let reopened = SentenceStore::open(medium.clone());
        assert_eq!(reopened.list(), store.list());

        let second = store.list()[1].id.clone();
        store.delete(&second).expect("delete");
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].target_text_a, "One");
    }

    // ==================== create Tests ====================

    #[test]
    fn test_create_assigns_identity() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let before = Utc::now();
        let record = store.create(greeting()).expect("create");

        assert!(!record.id.is_empty());
        assert!(record.created_at >= before);
        assert_eq!(record.source_text, "안녕하세요");
        assert_eq!(record.pronunciation.as_deref(), Some("곤니치와"));
        assert_eq!(store.get(&record.id), Some(&record));
    }

    #[test]
    fn test_create_prepends() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let first = store.create(numbered(1)).expect("create");
        let second = store.create(numbered(2)).expect("create");

        assert_eq!(store.list()[0].id, second.id);
        assert_eq!(store.list()[1].id, first.id);
    }

    #[test]
    fn test_create_ids_are_unique() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        for n in 0..50 {
            store.create(numbered(n)).expect("create");
        }
        let ids: HashSet<_> = store.list().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_create_rejects_blank_fields() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let result = store.create(NewSentence::new("안녕하세요", "Hello", "   "));

        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_persists() {
        let medium = MemoryStorage::new();
        let mut store = SentenceStore::open(medium.clone());
        let record = store.create(greeting()).expect("create");

        let reopened = SentenceStore::open(medium);
        assert_eq!(reopened.list(), &[record]);
    }

    #[test]
    fn test_create_rolls_back_on_storage_failure() {
        let medium = FlakyStorage::default();
        let mut store = SentenceStore::open(medium.clone());
        store.create(numbered(1)).expect("create");

        medium.fail_writes.store(true, Ordering::SeqCst);
        let result = store.create(numbered(2));

        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].source_text, "문장 1");
    }

    // ==================== update Tests ====================

    #[test]
    fn test_update_preserves_identity() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let record = store.create(greeting()).expect("create");

        let patch = SentencePatch {
            target_text_a: Some("Hi there".to_string()),
            pronunciation: Some(Some("콘니치와".to_string())),
            ..Default::default()
        };
        store.update(&record.id, patch).expect("update");

        let updated = store.get(&record.id).expect("still present");
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.created_at, record.created_at);
        assert_eq!(updated.target_text_a, "Hi there");
        assert_eq!(updated.pronunciation.as_deref(), Some("콘니치와"));
        assert_eq!(updated.target_text_b, record.target_text_b);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let medium = MemoryStorage::new();
        let mut store = SentenceStore::open(medium.clone());
        store.create(greeting()).expect("create");
        let saved = medium.contents();

        let patch = SentencePatch {
            source_text: Some("바뀜".to_string()),
            ..Default::default()
        };
        store.update("no-such-id", patch).expect("no-op");

        assert_eq!(store.list()[0].source_text, "안녕하세요");
        assert_eq!(medium.contents(), saved);
    }

    #[test]
    fn test_update_unknown_id_ignores_invalid_patch() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let record = store.create(greeting()).expect("create");
        store.delete(&record.id).expect("delete");

        let patch = SentencePatch {
            source_text: Some(String::new()),
            ..Default::default()
        };
        store.update(&record.id, patch.clone()).expect("no-op");
        store.update("never-existed", patch).expect("no-op");
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_rejects_blanking_required_field() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let record = store.create(greeting()).expect("create");

        let patch = SentencePatch {
            source_text: Some(String::new()),
            ..Default::default()
        };
        let result = store.update(&record.id, patch);

        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert_eq!(store.list()[0].source_text, "안녕하세요");
    }

    #[test]
    fn test_update_rolls_back_on_storage_failure() {
        let medium = FlakyStorage::default();
        let mut store = SentenceStore::open(medium.clone());
        let record = store.create(greeting()).expect("create");

        medium.fail_writes.store(true, Ordering::SeqCst);
        let patch = SentencePatch {
            target_text_a: Some("Good day".to_string()),
            ..Default::default()
        };
        assert!(store.update(&record.id, patch).is_err());
        assert_eq!(store.get(&record.id), Some(&record));
    }

    // ==================== delete Tests ====================

    #[test]
    fn test_delete_removes_record() {
        let medium = MemoryStorage::new();
        let mut store = SentenceStore::open(medium.clone());
        let keep = store.create(numbered(1)).expect("create");
        let gone = store.create(numbered(2)).expect("create");

        store.delete(&gone.id).expect("delete");

        assert_eq!(store.len(), 1);
        assert!(store.get(&gone.id).is_none());
        assert_eq!(SentenceStore::open(medium).list(), &[keep]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let record = store.create(greeting()).expect("create");

        store.delete(&record.id).expect("first delete");
        store.delete(&record.id).expect("second delete");
        store.delete("never-existed").expect("unknown delete");
        assert!(store.is_empty());
    }

    #[test]
    fn test_operations_on_deleted_id_are_noops() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let record = store.create(greeting()).expect("create");
        store.delete(&record.id).expect("delete");

        let patch = SentencePatch {
            target_text_a: Some("Hello again".to_string()),
            ..Default::default()
        };
        store.update(&record.id, patch).expect("no-op");
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_rolls_back_on_storage_failure() {
        let medium = FlakyStorage::default();
        let mut store = SentenceStore::open(medium.clone());
        let first = store.create(numbered(1)).expect("create");
        let second = store.create(numbered(2)).expect("create");

        medium.fail_writes.store(true, Ordering::SeqCst);
        assert!(store.delete(&first.id).is_err());

        let ids: Vec<_> = store.list().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    // ==================== Subscription Tests ====================

    #[test]
    fn test_listeners_receive_snapshot_after_each_mutation() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = seen.clone();
        store.subscribe(move |sentences| sink.lock().unwrap().push(sentences.len()));

        let record = store.create(numbered(1)).expect("create");
        store.create(numbered(2)).expect("create");
        store
            .update(
                &record.id,
                SentencePatch {
                    target_text_b: Some("文".to_string()),
                    ..Default::default()
                },
            )
            .expect("update");
        store.delete(&record.id).expect("delete");

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_noops_and_failures_do_not_notify() {
        let medium = FlakyStorage::default();
        let mut store = SentenceStore::open(medium.clone());
        let calls = Arc::new(Mutex::new(0));
        let sink = calls.clone();
        store.subscribe(move |_| *sink.lock().unwrap() += 1);

        store.delete("missing").expect("no-op");
        store
            .update("missing", SentencePatch::default())
            .expect("no-op");
        medium.fail_writes.store(true, Ordering::SeqCst);
        assert!(store.create(greeting()).is_err());

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut store = SentenceStore::open(MemoryStorage::new());
        let calls = Arc::new(Mutex::new(0));
        let sink = calls.clone();
        let subscription = store.subscribe(move |_| *sink.lock().unwrap() += 1);

        store.create(numbered(1)).expect("create");
        assert!(store.unsubscribe(subscription));
        assert!(!store.unsubscribe(subscription));
        store.create(numbered(2)).expect("create");

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_listener_sees_durable_state() {
        let medium = MemoryStorage::new();
        let mut store = SentenceStore::open(medium.clone());
        let check = medium.clone();
        let matched = Arc::new(AtomicBool::new(false));
        let flag = matched.clone();
        store.subscribe(move |sentences| {
            let stored = check.load().expect("load");
            flag.store(stored == sentences, Ordering::SeqCst);
        });

        store.create(greeting()).expect("create");
        assert!(matched.load(Ordering::SeqCst));
    }
}
