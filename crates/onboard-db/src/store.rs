//! SurrealDB implementation of [`DocumentStore`].
//!
//! Each collection maps to its own table; the record key is the document
//! key. Writes are compare-and-set on the `version` column, so two
//! writers racing on the same document cannot both win. Change
//! notifications are fanned out in-process to subscribers of this store
//! handle and its clones.

use onboard_core::error::{OnboardError, OnboardResult};
use onboard_core::store::{
    ChangeEvent, ChangeHub, Collection, Document, DocumentStore, Filter, Subscription, WriteOptions,
    prepare_write,
};
use serde_json::Value;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};

use crate::error::DbError;

/// Attempts for a write without an expected version before giving up on a
/// document that keeps changing underneath us.
const UNCONDITIONAL_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, SurrealValue)]
struct DocumentRow {
    data: Value,
    version: u64,
}

#[derive(Debug, SurrealValue)]
struct DocumentRowWithId {
    record_id: String,
    data: Value,
    version: u64,
}

#[derive(Clone)]
pub struct SurrealDocumentStore<C: Connection> {
    db: Surreal<C>,
    hub: ChangeHub,
}

impl<C: Connection> SurrealDocumentStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            hub: ChangeHub::new(),
        }
    }

    /// Number of live subscriptions on this handle.
    pub fn active_subscriptions(&self) -> usize {
        self.hub.active()
    }

    async fn fetch(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<DocumentRow>, DbError> {
        let query = format!(
            "SELECT data, version FROM type::record('{}', $id)",
            collection.as_str()
        );
        let mut result = self.db.query(&query).bind(("id", key.to_string())).await?;
        let rows: Vec<DocumentRow> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn insert(
        &self,
        collection: Collection,
        key: &str,
        data: Value,
        version: u64,
    ) -> OnboardResult<bool> {
        let query = format!(
            "CREATE type::record('{}', $id) SET data = $data, version = $version, \
             updated_at = time::now()",
            collection.as_str()
        );
        let response = self
            .db
            .query(&query)
            .bind(("id", key.to_string()))
            .bind(("data", data))
            .bind(("version", version))
            .await
            .map_err(DbError::from)?;

        match response.check() {
            Ok(_) => Ok(true),
            Err(e) => {
                // A concurrent create shows up as a failed statement; anything
                // else is a genuine database error.
                if self.fetch(collection, key).await?.is_some() {
                    Ok(false)
                } else {
                    Err(DbError::Query(e.to_string()).into())
                }
            }
        }
    }

    async fn compare_and_set(
        &self,
        collection: Collection,
        key: &str,
        data: Value,
        current: u64,
        version: u64,
    ) -> OnboardResult<bool> {
        let query = format!(
            "UPDATE type::record('{}', $id) SET data = $data, version = $version, \
             updated_at = time::now() WHERE version = $current",
            collection.as_str()
        );
        let response = self
            .db
            .query(&query)
            .bind(("id", key.to_string()))
            .bind(("data", data))
            .bind(("version", version))
            .bind(("current", current))
            .await
            .map_err(DbError::from)?;
        let mut response = response
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<DocumentRow> = response.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    /// One read-validate-write round. `Ok(None)` means another writer got
    /// there first.
    async fn write_once(
        &self,
        collection: Collection,
        key: &str,
        data: Value,
        options: WriteOptions,
    ) -> OnboardResult<Option<Document>> {
        let current = self.fetch(collection, key).await?;
        let (next, version) = prepare_write(
            collection,
            key,
            current.as_ref().map(|row| (&row.data, row.version)),
            data,
            options,
        )?;

        let written = match current {
            None => self.insert(collection, key, next.clone(), version).await?,
            Some(row) => {
                self.compare_and_set(collection, key, next.clone(), row.version, version)
                    .await?
            }
        };

        Ok(written.then(|| Document {
            collection,
            key: key.to_string(),
            data: next,
            version,
        }))
    }
}

impl<C: Connection> DocumentStore for SurrealDocumentStore<C> {
    async fn get_document(&self, collection: Collection, key: &str) -> OnboardResult<Document> {
        let row = self
            .fetch(collection, key)
            .await?
            .ok_or_else(|| DbError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        Ok(Document {
            collection,
            key: key.to_string(),
            data: row.data,
            version: row.version,
        })
    }

    async fn set_document(
        &self,
        collection: Collection,
        key: &str,
        data: Value,
        options: WriteOptions,
    ) -> OnboardResult<Document> {
        let attempts = if options.expected_version.is_some() {
            1
        } else {
            UNCONDITIONAL_WRITE_ATTEMPTS
        };

        for attempt in 1..=attempts {
            if let Some(doc) = self.write_once(collection, key, data.clone(), options).await? {
                debug!(%collection, key, version = doc.version, "Document written");
                self.hub.publish(ChangeEvent {
                    collection,
                    key: key.to_string(),
                    document: Some(doc.clone()),
                });
                return Ok(doc);
            }
            if attempt < attempts {
                warn!(%collection, key, attempt, "Lost write race, retrying");
            }
        }

        Err(OnboardError::Conflict {
            collection: collection.to_string(),
            key: key.to_string(),
        })
    }

    async fn delete_document(&self, collection: Collection, key: &str) -> OnboardResult<()> {
        let query = format!(
            "DELETE type::record('{}', $id) RETURN BEFORE",
            collection.as_str()
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("id", key.to_string()))
            .await
            .map_err(DbError::from)?;
        let removed: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;

        if !removed.is_empty() {
            debug!(%collection, key, "Document deleted");
            self.hub.publish(ChangeEvent {
                collection,
                key: key.to_string(),
                document: None,
            });
        }
        Ok(())
    }

    async fn subscribe(&self, collection: Collection, key: &str) -> OnboardResult<Subscription> {
        let current = match self.get_document(collection, key).await {
            Ok(doc) => Some(doc),
            Err(OnboardError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        Ok(self.hub.subscribe(collection, key, current))
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> OnboardResult<Vec<Document>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, data, version FROM {}",
            collection.as_str()
        );
        let mut result = self.db.query(&query).await.map_err(DbError::from)?;
        let rows: Vec<DocumentRowWithId> = result.take(0).map_err(DbError::from)?;

        let mut docs: Vec<Document> = rows
            .into_iter()
            .filter(|row| filters.iter().all(|f| f.matches(&row.data)))
            .map(|row| Document {
                collection,
                key: row.record_id,
                data: row.data,
                version: row.version,
            })
            .collect();
        docs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(docs)
    }
}
