//! In-memory [`DocumentStore`] used by tests and local runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{
    ChangeEvent, ChangeHub, Collection, Document, DocumentStore, Filter, Subscription, WriteOptions,
    prepare_write,
};
use crate::error::{OnboardError, OnboardResult};

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<(Collection, String), (Value, u64)>,
    failing_writes: u32,
}

/// A process-local store with the same versioning, merge and
/// subscription semantics as the database-backed store.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<MemoryState>>,
    hub: ChangeHub,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with [`OnboardError::Unavailable`],
    /// as a flaky network would.
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    /// Number of live subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.hub.active()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn snapshot(&self, collection: Collection, key: &str) -> Option<Document> {
        self.lock()
            .documents
            .get(&(collection, key.to_string()))
            .map(|(data, version)| Document {
                collection,
                key: key.to_string(),
                data: data.clone(),
                version: *version,
            })
    }

    fn take_injected_failure(state: &mut MemoryState) -> OnboardResult<()> {
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(OnboardError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, collection: Collection, key: &str) -> OnboardResult<Document> {
        self.snapshot(collection, key)
            .ok_or_else(|| OnboardError::not_found(collection.as_str(), key))
    }

    async fn set_document(
        &self,
        collection: Collection,
        key: &str,
        data: Value,
        options: WriteOptions,
    ) -> OnboardResult<Document> {
        let doc = {
            let mut state = self.lock();
            Self::take_injected_failure(&mut state)?;
            let slot = (collection, key.to_string());
            let current = state.documents.get(&slot).map(|(d, v)| (d, *v));
            let (data, version) = prepare_write(collection, key, current, data, options)?;
            state.documents.insert(slot, (data.clone(), version));
            Document {
                collection,
                key: key.to_string(),
                data,
                version,
            }
        };

        self.hub.publish(ChangeEvent {
            collection,
            key: key.to_string(),
            document: Some(doc.clone()),
        });
        Ok(doc)
    }

    async fn delete_document(&self, collection: Collection, key: &str) -> OnboardResult<()> {
        let removed = {
            let mut state = self.lock();
            Self::take_injected_failure(&mut state)?;
            state.documents.remove(&(collection, key.to_string())).is_some()
        };
        if removed {
            self.hub.publish(ChangeEvent {
                collection,
                key: key.to_string(),
                document: None,
            });
        }
        Ok(())
    }

    async fn subscribe(&self, collection: Collection, key: &str) -> OnboardResult<Subscription> {
        let current = self.snapshot(collection, key);
        Ok(self.hub.subscribe(collection, key, current))
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> OnboardResult<Vec<Document>> {
        let state = self.lock();
        Ok(state
            .documents
            .iter()
            .filter(|((c, _), (data, _))| {
                *c == collection && filters.iter().all(|f| f.matches(data))
            })
            .map(|((c, key), (data, version))| Document {
                collection: *c,
                key: key.clone(),
                data: data.clone(),
                version: *version,
            })
            .collect())
    }
}
