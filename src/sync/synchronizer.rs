//! Cache synchronizer
//!
//! Lets callers show the expected post-mutation state while the remote call
//! is in flight, and guarantees the cache never durably shows the effect of a
//! mutation that ultimately failed.
//!
//! # Flow
//!
//! | Step | Success | Failure |
//! |------|---------|---------|
//! | begin | optimistic write, version bumped | same |
//! | settle | refetch target + related keys | rollback if version unchanged, invalidate |
//!
//! Nothing here retries a remote call. Retrying is a user action.

use crate::config::schema::StoreConfig;
use crate::error::{ElyxError, ElyxResult};
use crate::store::{RemoteError, RemoteResult, RemoteStore};
use crate::sync::cache::{QueryCache, Rollback};
use crate::sync::key::CacheKey;
use crate::sync::mutation::{
    MutationOutcome, MutationPlan, MutationReceipt, PendingMutation, RemoteRequest, SettleReport,
};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default bound on a remote write
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on a remote read
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Keeps a [`QueryCache`] consistent with a [`RemoteStore`]
#[derive(Clone)]
pub struct Synchronizer {
    cache: Arc<QueryCache>,
    store: Arc<dyn RemoteStore>,
    mutation_timeout: Duration,
    fetch_timeout: Duration,
}

impl Synchronizer {
    /// Create a synchronizer with its own empty cache
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache: Arc::new(QueryCache::new()),
            store,
            mutation_timeout: DEFAULT_MUTATION_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Create a synchronizer with timeouts from configuration
    pub fn from_config(store: Arc<dyn RemoteStore>, config: &StoreConfig) -> Self {
        Self::new(store).with_timeouts(
            Duration::from_secs(config.mutation_timeout_secs.max(1)),
            Duration::from_secs(config.fetch_timeout_secs.max(1)),
        )
    }

    /// Share an existing cache
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_timeouts(mut self, mutation: Duration, fetch: Duration) -> Self {
        self.mutation_timeout = mutation;
        self.fetch_timeout = fetch;
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Cached value, never touching the remote store
    pub fn peek(&self, key: &CacheKey) -> Option<Value> {
        self.cache.peek(key)
    }

    /// Cached value if fresh, otherwise fetched and cached
    ///
    /// A failed fetch keeps the last-known value (marked stale) and reports
    /// `FetchFailed`.
    pub async fn read(&self, key: &CacheKey) -> ElyxResult<Value> {
        if self.cache.is_fresh(key) {
            if let Some(value) = self.cache.peek(key) {
                debug!("Cache hit for {}", key);
                return Ok(value);
            }
        }

        let seen = self.cache.version(key);
        match self.fetch(key).await {
            Ok(value) => {
                if self.cache.store_fetched(key, value.clone(), seen) {
                    Ok(value)
                } else {
                    Ok(self.cache.peek(key).unwrap_or(value))
                }
            }
            Err(err) => {
                self.cache.invalidate([key]);
                warn!("Fetch of {} failed: {}", key, err);
                Err(ElyxError::fetch_failed(key, err.status, err.message))
            }
        }
    }

    /// Apply an optimistic write and return its pending record
    pub fn begin_optimistic_mutation<F>(&self, key: CacheKey, mutate: F) -> PendingMutation
    where
        F: FnOnce(Option<Value>) -> Option<Value>,
    {
        self.cache.apply_optimistic(key, mutate)
    }

    /// Settle a pending mutation with the outcome of its remote call
    ///
    /// Success reconciles the target and related keys from the remote store.
    /// Failure rolls back (unless a newer write owns the key), invalidates,
    /// and returns the failure. Settling twice is a no-op.
    pub async fn settle(
        &self,
        pending: &PendingMutation,
        outcome: MutationOutcome,
    ) -> ElyxResult<SettleReport> {
        self.settle_all(std::slice::from_ref(pending), outcome, &[])
            .await
    }

    /// Mark keys stale so the next read refetches
    pub fn invalidate(&self, keys: &[CacheKey]) {
        self.cache.invalidate(keys);
    }

    /// Drop cached values outright
    pub fn evict(&self, keys: &[CacheKey]) {
        self.cache.evict(keys);
    }

    /// Run a mutation end to end: optimistic apply, remote call, settle
    pub async fn mutate(&self, plan: MutationPlan) -> ElyxResult<MutationReceipt> {
        let MutationPlan {
            request,
            optimistic,
            related,
        } = plan;

        {
            let mut targets = HashSet::new();
            for update in &optimistic {
                if !targets.insert(&update.key) {
                    return Err(ElyxError::User(format!(
                        "Mutation plan writes {} more than once",
                        update.key
                    )));
                }
            }
        }

        let label = request
            .entity_key()
            .map(|key| key.to_string())
            .unwrap_or_else(|| request.collection().to_string());

        let pending: Vec<PendingMutation> = optimistic
            .into_iter()
            .map(|update| {
                self.cache
                    .apply_optimistic(update.key, update.updater)
                    .relate(related.iter().cloned())
            })
            .collect();

        info!("Sending mutation for {}", label);
        let call = request.send(self.store.as_ref());
        let outcome = match tokio::time::timeout(self.mutation_timeout, call).await {
            Ok(Ok(payload)) => MutationOutcome::Success(payload),
            Ok(Err(err)) => {
                MutationOutcome::Failure(ElyxError::mutation_failed(&label, err.status, err.message))
            }
            Err(_) => MutationOutcome::Failure(ElyxError::MutationTimeout {
                key: label.clone(),
                secs: self.mutation_timeout.as_secs(),
            }),
        };

        let payload = match &outcome {
            MutationOutcome::Success(payload) => payload.clone(),
            MutationOutcome::Failure(_) => Value::Null,
        };

        if let RemoteRequest::Create { collection, .. } = &request {
            self.seed_created(collection, &payload);
        }

        let mut extra = related;
        extra.extend(request.entity_key());
        extra.extend(self.cache.list_keys(request.collection()));
        let report = self.settle_all(&pending, outcome, &extra).await?;

        Ok(MutationReceipt { payload, report })
    }

    /// Run a mutation on a detached task
    ///
    /// Dropping the handle only drops delivery of the result; the mutation
    /// still settles and its cache effects still happen.
    pub fn spawn_mutation(&self, plan: MutationPlan) -> JoinHandle<ElyxResult<MutationReceipt>> {
        let this = self.clone();
        tokio::spawn(async move { this.mutate(plan).await })
    }

    async fn settle_all(
        &self,
        pending: &[PendingMutation],
        outcome: MutationOutcome,
        extra: &[CacheKey],
    ) -> ElyxResult<SettleReport> {
        let mut report = SettleReport::default();
        let mut keys: Vec<CacheKey> = extra.to_vec();

        match outcome {
            MutationOutcome::Success(_) => {
                for mutation in pending {
                    if self.cache.complete(mutation) {
                        keys.push(mutation.target_key.clone());
                        keys.extend(mutation.related.iter().cloned());
                    } else {
                        report.already_settled += 1;
                    }
                }

                if keys.is_empty() {
                    return Ok(report);
                }

                let keys = self.with_aggregates(keys);
                self.reconcile(&keys, &mut report).await;
                Ok(report)
            }
            MutationOutcome::Failure(err) => {
                for mutation in pending.iter().rev() {
                    match self.cache.rollback(mutation) {
                        Rollback::AlreadySettled => report.already_settled += 1,
                        Rollback::Restored | Rollback::Superseded => {
                            keys.push(mutation.target_key.clone());
                            keys.extend(mutation.related.iter().cloned());
                        }
                    }
                }

                if !pending.is_empty() && report.already_settled == pending.len() {
                    debug!("Mutation already settled, ignoring repeated failure");
                    return Ok(report);
                }

                let keys = self.with_aggregates(keys);
                self.cache.invalidate(&keys);
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Add cached list keys of every touched collection, deduplicated
    fn with_aggregates(&self, keys: Vec<CacheKey>) -> Vec<CacheKey> {
        let collections: BTreeSet<String> = keys
            .iter()
            .map(|key| key.collection().to_string())
            .collect();

        let mut seen = HashSet::new();
        let mut all = Vec::with_capacity(keys.len());
        let lists = collections
            .iter()
            .flat_map(|collection| self.cache.list_keys(collection));

        for key in keys.into_iter().chain(lists) {
            if seen.insert(key.clone()) {
                all.push(key);
            }
        }
        all
    }

    async fn reconcile(&self, keys: &[CacheKey], report: &mut SettleReport) {
        let fetches = keys.iter().map(|key| async move {
            let seen = self.cache.version(key);
            (key, seen, self.fetch(key).await)
        });

        for (key, seen, result) in join_all(fetches).await {
            match result {
                Ok(value) => {
                    if self.cache.store_fetched(key, value, seen) {
                        report.reconciled.push(key.clone());
                    }
                }
                Err(err) if err.is_not_found() && !key.is_list() => {
                    debug!("{} no longer exists remotely, evicting", key);
                    self.cache.evict([key]);
                    report.evicted.push(key.clone());
                }
                Err(err) => {
                    warn!("Reconciliation of {} failed: {}", key, err);
                    self.cache.invalidate([key]);
                    report
                        .fetch_errors
                        .push(ElyxError::fetch_failed(key, err.status, err.message));
                }
            }
        }
    }

    fn seed_created(&self, collection: &str, payload: &Value) {
        if let Some(id) = payload.get("id").and_then(Value::as_str) {
            let key = CacheKey::entity(collection, id);
            let version = self.cache.version(&key);
            self.cache.store_fetched(&key, payload.clone(), version);
        }
    }

    async fn fetch(&self, key: &CacheKey) -> RemoteResult<Value> {
        let call = async {
            match key {
                CacheKey::Entity { collection, id } => self.store.fetch_one(collection, id).await,
                CacheKey::List { collection, query } => {
                    self.store.fetch_list(collection, query).await
                }
            }
        };

        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::new(
                408,
                format!("timed out after {}s", self.fetch_timeout.as_secs()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ListQuery, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;

    fn project_key() -> CacheKey {
        CacheKey::entity("projects", "project-1")
    }

    async fn setup() -> (Synchronizer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed("projects", json!({"id": "project-1", "name": "Old Name"}));
        let sync = Synchronizer::new(store.clone());
        sync.read(&project_key()).await.unwrap();
        (sync, store)
    }

    fn rename(name: &'static str) -> impl FnOnce(Option<Value>) -> Option<Value> {
        move |value| {
            let mut value = value?;
            value["name"] = json!(name);
            Some(value)
        }
    }

    #[tokio::test]
    async fn read_caches_until_invalidated() {
        let (sync, store) = setup().await;
        assert_eq!(store.read_count(), 1);

        sync.read(&project_key()).await.unwrap();
        assert_eq!(store.read_count(), 1);

        sync.invalidate(&[project_key()]);
        sync.read(&project_key()).await.unwrap();
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn failed_read_keeps_stale_value() {
        let (sync, store) = setup().await;
        sync.invalidate(&[project_key()]);
        store.fail_next(1, 500, "database down");

        let err = sync.read(&project_key()).await.unwrap_err();
        assert!(matches!(err, ElyxError::FetchFailed { status: 500, .. }));
        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "Old Name");
    }

    #[tokio::test]
    async fn failure_rolls_back_and_surfaces_error() {
        let (sync, _store) = setup().await;
        let pending = sync.begin_optimistic_mutation(project_key(), rename("New Name"));
        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "New Name");

        let result = sync
            .settle(
                &pending,
                MutationOutcome::Failure(ElyxError::mutation_failed(&pending.target_key, 500, "boom")),
            )
            .await;

        assert!(matches!(result, Err(ElyxError::MutationFailed { .. })));
        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "Old Name");
    }

    #[tokio::test]
    async fn older_failure_keeps_newer_optimistic_value() {
        let (sync, _store) = setup().await;
        let first = sync.begin_optimistic_mutation(project_key(), rename("First"));
        let second = sync.begin_optimistic_mutation(project_key(), rename("Second"));

        let _ = sync
            .settle(
                &first,
                MutationOutcome::Failure(ElyxError::mutation_failed("projects/project-1", 409, "conflict")),
            )
            .await;

        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "Second");
        assert!(sync.cache().is_in_flight(&second));
    }

    #[tokio::test]
    async fn repeated_failure_settle_is_idempotent() {
        let (sync, _store) = setup().await;
        let pending = sync.begin_optimistic_mutation(project_key(), rename("New Name"));
        let failure = || MutationOutcome::Failure(ElyxError::mutation_failed("p", 500, "boom"));

        assert!(sync.settle(&pending, failure()).await.is_err());
        let newer = sync.begin_optimistic_mutation(project_key(), rename("Newer"));

        let report = sync.settle(&pending, failure()).await.unwrap();
        assert_eq!(report.already_settled, 1);
        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "Newer");
        assert!(sync.cache().is_in_flight(&newer));
    }

    #[tokio::test]
    async fn success_reconciles_even_when_values_match() {
        let (sync, store) = setup().await;
        let before = sync.cache().entry(&project_key()).unwrap().fetched_at;
        let reads = store.read_count();

        let pending = sync.begin_optimistic_mutation(project_key(), rename("Old Name"));
        let report = sync
            .settle(&pending, MutationOutcome::Success(json!({})))
            .await
            .unwrap();

        assert_eq!(report.reconciled, vec![project_key()]);
        assert_eq!(store.read_count(), reads + 1);
        let entry = sync.cache().entry(&project_key()).unwrap();
        assert!(entry.fetched_at >= before);
        assert!(!entry.stale);
    }

    #[tokio::test]
    async fn mutate_replaces_optimistic_value_with_server_truth() {
        let (sync, store) = setup().await;

        let receipt = sync
            .mutate(MutationPlan::update(
                "projects",
                "project-1",
                json!({"name": "New Name"}),
            ))
            .await
            .unwrap();

        assert_eq!(receipt.payload["name"], "New Name");
        let cached = sync.peek(&project_key()).unwrap();
        assert_eq!(cached["name"], "New Name");
        assert_eq!(cached["revision"], 1);
        assert!(cached["updatedAt"].is_string());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn mutate_failure_restores_and_invalidates() {
        let (sync, store) = setup().await;
        store.fail_next(1, 422, "name taken");

        let err = sync
            .mutate(MutationPlan::update(
                "projects",
                "project-1",
                json!({"name": "New Name"}),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, ElyxError::MutationFailed { status: 422, .. }));
        let entry = sync.cache().entry(&project_key()).unwrap();
        assert_eq!(entry.value["name"], "Old Name");
        assert!(entry.stale);
    }

    #[tokio::test]
    async fn mutate_reconciles_cached_lists() {
        let (sync, store) = setup().await;
        let list = CacheKey::list("projects", ListQuery::default());
        sync.read(&list).await.unwrap();
        assert_eq!(sync.peek(&list).unwrap()["total"], 1);

        let receipt = sync
            .mutate(
                MutationPlan::create("projects", json!({"id": "project-2", "name": "Wedding"}))
                    .optimistic(list.clone(), |page| {
                        let mut page = page?;
                        if let Some(items) = page["items"].as_array_mut() {
                            items.push(json!({"id": "project-2", "name": "Wedding"}));
                        }
                        Some(page)
                    }),
            )
            .await
            .unwrap();

        assert!(receipt.report.reconciled.contains(&list));
        assert_eq!(sync.peek(&list).unwrap()["total"], 2);
        assert!(sync
            .peek(&CacheKey::entity("projects", "project-2"))
            .is_some());
        assert!(store.get("projects", "project-2").is_some());
    }

    #[tokio::test]
    async fn create_without_optimistic_write_refreshes_lists() {
        let (sync, store) = setup().await;
        let list = CacheKey::list("projects", ListQuery::default());
        sync.read(&list).await.unwrap();
        let reads = store.read_count();

        let receipt = sync
            .mutate(MutationPlan::create(
                "projects",
                json!({"id": "project-2", "name": "Wedding"}),
            ))
            .await
            .unwrap();

        assert!(receipt.report.reconciled.contains(&list));
        assert_eq!(store.read_count(), reads + 1);
        let entry = sync.cache().entry(&list).unwrap();
        assert_eq!(entry.value["total"], 2);
        assert!(!entry.stale);
    }

    #[tokio::test]
    async fn failed_create_invalidates_lists() {
        let (sync, store) = setup().await;
        let list = CacheKey::list("projects", ListQuery::default());
        sync.read(&list).await.unwrap();
        store.fail_next(1, 500, "database down");

        let err = sync
            .mutate(MutationPlan::create(
                "projects",
                json!({"id": "project-2", "name": "Wedding"}),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, ElyxError::MutationFailed { status: 500, .. }));
        let entry = sync.cache().entry(&list).unwrap();
        assert_eq!(entry.value["total"], 1);
        assert!(entry.stale);
        assert!(sync.peek(&CacheKey::entity("projects", "project-2")).is_none());
    }

    #[tokio::test]
    async fn failed_write_over_failed_write_stays_stale() {
        let (sync, store) = setup().await;
        let first = sync.begin_optimistic_mutation(project_key(), rename("First"));
        let second = sync.begin_optimistic_mutation(project_key(), rename("Second"));
        let failure = || MutationOutcome::Failure(ElyxError::mutation_failed("p", 500, "boom"));

        assert!(sync.settle(&first, failure()).await.is_err());
        assert!(sync.settle(&second, failure()).await.is_err());

        // Second's snapshot is First's optimistic value; it must not read as fresh
        let entry = sync.cache().entry(&project_key()).unwrap();
        assert_eq!(entry.value["name"], "First");
        assert!(entry.stale);

        let reads = store.read_count();
        let value = sync.read(&project_key()).await.unwrap();
        assert_eq!(value["name"], "Old Name");
        assert_eq!(store.read_count(), reads + 1);
    }

    #[tokio::test]
    async fn mutate_delete_evicts_entity() {
        let (sync, _store) = setup().await;

        let receipt = sync
            .mutate(MutationPlan::delete("projects", "project-1"))
            .await
            .unwrap();

        assert_eq!(receipt.report.evicted, vec![project_key()]);
        assert!(sync.peek(&project_key()).is_none());
    }

    #[tokio::test]
    async fn reconciliation_failure_is_reported_not_fatal() {
        let (sync, store) = setup().await;
        let pending = sync.begin_optimistic_mutation(project_key(), rename("New Name"));
        store.fail_next(1, 503, "unavailable");

        let report = sync
            .settle(&pending, MutationOutcome::Success(json!({})))
            .await
            .unwrap();

        assert!(!report.is_clean());
        let entry = sync.cache().entry(&project_key()).unwrap();
        assert_eq!(entry.value["name"], "New Name");
        assert!(entry.stale);
    }

    #[tokio::test]
    async fn duplicate_targets_rejected_before_any_write() {
        let (sync, store) = setup().await;
        let plan = MutationPlan::update("projects", "project-1", json!({"name": "A"}))
            .optimistic(project_key(), rename("B"));

        assert!(matches!(sync.mutate(plan).await, Err(ElyxError::User(_))));
        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "Old Name");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn shared_cache_sees_other_synchronizer_writes() {
        let (sync, store) = setup().await;
        let other = Synchronizer::new(store.clone()).with_cache(sync.cache().clone());

        other
            .mutate(MutationPlan::update(
                "projects",
                "project-1",
                json!({"name": "From Other"}),
            ))
            .await
            .unwrap();

        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "From Other");
        assert_eq!(store.read_count(), 2);
    }

    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl RemoteStore for SlowStore {
        async fn fetch_one(&self, collection: &str, id: &str) -> RemoteResult<Value> {
            self.inner.fetch_one(collection, id).await
        }

        async fn fetch_list(&self, collection: &str, query: &ListQuery) -> RemoteResult<Value> {
            self.inner.fetch_list(collection, query).await
        }

        async fn create(&self, collection: &str, value: Value) -> RemoteResult<Value> {
            self.inner.create(collection, value).await
        }

        async fn update(&self, collection: &str, id: &str, patch: Value) -> RemoteResult<Value> {
            tokio::time::sleep(self.delay).await;
            self.inner.update(collection, id, patch).await
        }

        async fn delete(&self, collection: &str, id: &str) -> RemoteResult<Value> {
            self.inner.delete(collection, id).await
        }

        fn store_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn mutation_timeout_counts_as_failure() {
        let inner = MemoryStore::new();
        inner.seed("projects", json!({"id": "project-1", "name": "Old Name"}));
        let store = Arc::new(SlowStore {
            inner,
            delay: Duration::from_secs(5),
        });
        let sync = Synchronizer::new(store)
            .with_timeouts(Duration::from_millis(50), DEFAULT_FETCH_TIMEOUT);
        sync.read(&project_key()).await.unwrap();

        let err = sync
            .mutate(MutationPlan::update(
                "projects",
                "project-1",
                json!({"name": "New Name"}),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, ElyxError::MutationTimeout { .. }));
        assert_eq!(sync.peek(&project_key()).unwrap()["name"], "Old Name");
    }

    #[tokio::test]
    async fn detached_mutation_settles_after_handle_dropped() {
        let inner = MemoryStore::new();
        inner.seed("projects", json!({"id": "project-1", "name": "Old Name"}));
        let store = Arc::new(SlowStore {
            inner,
            delay: Duration::from_millis(20),
        });
        let sync = Synchronizer::new(store.clone());
        sync.read(&project_key()).await.unwrap();

        drop(sync.spawn_mutation(MutationPlan::update(
            "projects",
            "project-1",
            json!({"name": "New Name"}),
        )));

        let mut settled = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if sync
                .peek(&project_key())
                .is_some_and(|value| value["revision"] == 1)
            {
                settled = true;
                break;
            }
        }
        assert!(settled);
        assert_eq!(store.inner.write_count(), 1);
    }
}
