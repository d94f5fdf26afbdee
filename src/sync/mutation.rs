//! Mutation records and plans

use crate::error::ElyxError;
use crate::store::{RemoteResult, RemoteStore};
use crate::sync::key::CacheKey;
use serde_json::Value;
use uuid::Uuid;

/// Optimistic transform applied to a cached value
pub type Updater = Box<dyn FnOnce(Option<Value>) -> Option<Value> + Send>;

/// A mutation whose optimistic effect is in the cache but not yet settled
#[derive(Debug)]
pub struct PendingMutation {
    pub id: Uuid,

    /// Key the optimistic write went to
    pub target_key: CacheKey,

    /// Value before the write; `None` if the key was not cached
    pub previous_snapshot: Option<Value>,

    /// Version stamped on the cache by the optimistic write
    pub applied_version: u64,

    /// Aggregate keys to reconcile or invalidate together with the target
    pub related: Vec<CacheKey>,
}

impl PendingMutation {
    pub(crate) fn new(
        target_key: CacheKey,
        previous_snapshot: Option<Value>,
        applied_version: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_key,
            previous_snapshot,
            applied_version,
            related: vec![],
        }
    }

    /// Attach related aggregate keys
    pub fn relate(mut self, keys: impl IntoIterator<Item = CacheKey>) -> Self {
        self.related.extend(keys);
        self
    }
}

/// How the remote call behind a mutation ended
#[derive(Debug)]
pub enum MutationOutcome {
    /// Remote store accepted the write; carries its payload
    Success(Value),
    /// Remote store rejected or errored
    Failure(ElyxError),
}

/// Result of settling one or more pending mutations
#[derive(Debug, Default)]
pub struct SettleReport {
    /// Keys refreshed from the remote store
    pub reconciled: Vec<CacheKey>,

    /// Keys dropped because the remote store no longer has them
    pub evicted: Vec<CacheKey>,

    /// Reconciliation fetches that failed; those keys keep a stale value
    pub fetch_errors: Vec<ElyxError>,

    /// Number of mutations that were already settled before this call
    pub already_settled: usize,
}

impl SettleReport {
    pub fn is_clean(&self) -> bool {
        self.fetch_errors.is_empty()
    }
}

/// Remote write behind a mutation
#[derive(Debug, Clone)]
pub enum RemoteRequest {
    Create {
        collection: String,
        value: Value,
    },
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl RemoteRequest {
    pub fn collection(&self) -> &str {
        match self {
            Self::Create { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    /// Entity key the request writes to, when known before the call
    pub fn entity_key(&self) -> Option<CacheKey> {
        match self {
            Self::Create { .. } => None,
            Self::Update { collection, id, .. } | Self::Delete { collection, id } => {
                Some(CacheKey::entity(collection.as_str(), id.as_str()))
            }
        }
    }

    pub(crate) async fn send(&self, store: &dyn RemoteStore) -> RemoteResult<Value> {
        match self {
            Self::Create { collection, value } => store.create(collection, value.clone()).await,
            Self::Update {
                collection,
                id,
                patch,
            } => store.update(collection, id, patch.clone()).await,
            Self::Delete { collection, id } => store.delete(collection, id).await,
        }
    }
}

/// An optimistic write to apply before the remote call
pub struct OptimisticUpdate {
    pub key: CacheKey,
    pub updater: Updater,
}

impl std::fmt::Debug for OptimisticUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticUpdate")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Everything needed to run one mutation end to end
#[derive(Debug)]
pub struct MutationPlan {
    pub request: RemoteRequest,
    pub optimistic: Vec<OptimisticUpdate>,
    pub related: Vec<CacheKey>,
}

impl MutationPlan {
    pub fn new(request: RemoteRequest) -> Self {
        Self {
            request,
            optimistic: vec![],
            related: vec![],
        }
    }

    /// Patch a record, merging `patch` into its cached value optimistically
    pub fn update(collection: &str, id: &str, patch: Value) -> Self {
        let key = CacheKey::entity(collection, id);
        let merge = patch.clone();
        Self::new(RemoteRequest::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        })
        .optimistic(key, move |current| current.map(|value| merge_patch(value, &merge)))
    }

    /// Delete a record, removing it from the cache optimistically
    pub fn delete(collection: &str, id: &str) -> Self {
        let key = CacheKey::entity(collection, id);
        Self::new(RemoteRequest::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })
        .optimistic(key, |_| None)
    }

    /// Create a record; no optimistic write until one is added
    pub fn create(collection: &str, value: Value) -> Self {
        Self::new(RemoteRequest::Create {
            collection: collection.to_string(),
            value,
        })
    }

    /// Add an optimistic write
    pub fn optimistic<F>(mut self, key: CacheKey, updater: F) -> Self
    where
        F: FnOnce(Option<Value>) -> Option<Value> + Send + 'static,
    {
        self.optimistic.push(OptimisticUpdate {
            key,
            updater: Box::new(updater),
        });
        self
    }

    /// Add a related aggregate key
    pub fn related(mut self, key: CacheKey) -> Self {
        self.related.push(key);
        self
    }
}

/// What a completed mutation returns to its caller
#[derive(Debug)]
pub struct MutationReceipt {
    /// Payload returned by the remote store
    pub payload: Value,
    pub report: SettleReport,
}

/// Shallow merge of a JSON object patch into a value
pub fn merge_patch(mut value: Value, patch: &Value) -> Value {
    if let (Value::Object(target), Value::Object(fields)) = (&mut value, patch) {
        for (field, field_value) in fields {
            target.insert(field.clone(), field_value.clone());
        }
    }
    value
}
