//! In-memory remote store
//!
//! Behaves like the marketplace API closely enough to drive the synchronizer
//! without a network: records live per collection, every write stamps the
//! server-computed `updatedAt` and `revision` fields, and failures can be
//! injected for the next N calls.

use super::{ListQuery, RemoteError, RemoteResult, RemoteStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    failures: VecDeque<RemoteError>,
}

/// Remote store that keeps records in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    revision: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing failure injection and stamping
    pub fn seed(&self, collection: &str, record: Value) {
        let id = record_id(&record).unwrap_or_else(|| Uuid::new_v4().to_string());
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, record);
    }

    /// Make the next `count` calls fail with the given error
    pub fn fail_next(&self, count: usize, status: u16, message: &str) {
        let mut state = self.lock();
        for _ in 0..count {
            state.failures.push_back(RemoteError::new(status, message));
        }
    }

    /// Current stored record, bypassing failure injection
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
    }

    /// Number of fetch calls served or failed
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls served or failed
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(state: &mut MemoryState) -> RemoteResult<()> {
        match state.failures.pop_front() {
            Some(err) => {
                debug!("Injected store failure: {}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn stamp(&self, record: &mut Map<String, Value>) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        record.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));
        record.insert("revision".to_string(), json!(revision));
    }
}

fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_matches(record: &Value, field: &str, expected: &str) -> bool {
    match record.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    }
}

fn as_object(value: Value, what: &str) -> RemoteResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(RemoteError::new(400, format!("{} must be a JSON object", what))),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_one(&self, collection: &str, id: &str) -> RemoteResult<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        state
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("{}/{}", collection, id)))
    }

    async fn fetch_list(&self, collection: &str, query: &ListQuery) -> RemoteResult<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        let matching: Vec<Value> = state
            .collections
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|record| {
                        query
                            .filter
                            .iter()
                            .all(|(field, value)| field_matches(record, field, value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let total = matching.len();
        let skip = (query.page.saturating_sub(1) as usize).saturating_mul(query.limit as usize);
        let items: Vec<Value> = matching
            .into_iter()
            .skip(skip)
            .take(query.limit as usize)
            .collect();

        Ok(json!({
            "items": items,
            "page": query.page,
            "limit": query.limit,
            "total": total,
        }))
    }

    async fn create(&self, collection: &str, value: Value) -> RemoteResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut record = as_object(value, "record")?;
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        let id = record_id(&Value::Object(record.clone()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let records = state.collections.entry(collection.to_string()).or_default();
        if records.contains_key(&id) {
            return Err(RemoteError::new(
                409,
                format!("{}/{} already exists", collection, id),
            ));
        }

        record.insert("id".to_string(), json!(id));
        self.stamp(&mut record);
        let record = Value::Object(record);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> RemoteResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let patch = as_object(patch, "patch")?;
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        let Some(Value::Object(record)) = state
            .collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
        else {
            return Err(RemoteError::not_found(format!("{}/{}", collection, id)));
        };

        for (field, value) in patch {
            if field != "id" {
                record.insert(field, value);
            }
        }
        self.stamp(record);
        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::take_failure(&mut state)?;

        state
            .collections
            .get_mut(collection)
            .and_then(|records| records.remove(id))
            .map(|_| json!({ "id": id, "deleted": true }))
            .ok_or_else(|| RemoteError::not_found(format!("{}/{}", collection, id)))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_stamps_server_fields() {
        let store = MemoryStore::new();
        store.seed("projects", json!({"id": "p1", "name": "Old"}));

        let updated = store
            .update("projects", "p1", json!({"name": "New", "id": "hijack"}))
            .await
            .unwrap();

        assert_eq!(updated["id"], "p1");
        assert_eq!(updated["name"], "New");
        assert_eq!(updated["revision"], 1);
        assert!(updated["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.seed("projects", json!({"id": "p1"}));
        store.fail_next(1, 503, "maintenance");

        let err = store.fetch_one("projects", "p1").await.unwrap_err();
        assert_eq!(err.status, 503);
        assert!(store.fetch_one("projects", "p1").await.is_ok());
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let status = if i % 2 == 0 { "live" } else { "draft" };
            store.seed(
                "templates",
                json!({"id": format!("t{}", i), "status": status}),
            );
        }

        let query = ListQuery::new(1, 2).with_filter("status", "live");
        let page = store.fetch_list("templates", &query).await.unwrap();
        assert_eq!(page["total"], 3);
        assert_eq!(page["items"].as_array().unwrap().len(), 2);

        let query = ListQuery::new(2, 2).with_filter("status", "live");
        let page = store.fetch_list("templates", &query).await.unwrap();
        assert_eq!(page["items"][0]["id"], "t4");
    }

    #[tokio::test]
    async fn create_assigns_id_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store
            .create("projects", json!({"name": "Birthday"}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert!(store.get("projects", &id).is_some());

        let err = store
            .create("projects", json!({"id": id, "name": "Again"}))
            .await
            .unwrap_err();
        assert_eq!(err.status, 409);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete("projects", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
