//! Remote data store boundary
//!
//! The synchronizer never talks HTTP itself. It consumes the [`RemoteStore`]
//! trait, which can be implemented by different backends:
//! - [`RestStore`]: the marketplace REST API over `reqwest`
//! - [`MemoryStore`]: in-process records with failure injection

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::config::schema::StoreConfig;
use crate::error::{ElyxError, ElyxResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Result of a single remote store call
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Structured error returned by the remote store
///
/// `status` follows HTTP semantics. Transport failures that never produced a
/// response use status 0.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {status})")]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Error for a call that never got a response
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Error for a record that does not exist
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(404, format!("{} not found", what))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Filter and pagination for a list fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListQuery {
    /// Exact-match field filters
    pub filter: BTreeMap<String, String>,

    /// 1-based page number
    pub page: u32,

    /// Page size
    pub limit: u32,
}

impl ListQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            filter: BTreeMap::new(),
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Add an exact-match filter
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page={}&limit={}", self.page, self.limit)?;
        for (field, value) in &self.filter {
            write!(f, "&{}={}", field, value)?;
        }
        Ok(())
    }
}

/// Abstract remote data store
///
/// Each call returns the success payload or a [`RemoteError`]. No other shape
/// is assumed about the backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a single record by id
    async fn fetch_one(&self, collection: &str, id: &str) -> RemoteResult<Value>;

    /// Fetch a page of records matching a filter
    async fn fetch_list(&self, collection: &str, query: &ListQuery) -> RemoteResult<Value>;

    /// Create a record, returning the stored record
    async fn create(&self, collection: &str, value: Value) -> RemoteResult<Value>;

    /// Patch a record, returning the stored record
    async fn update(&self, collection: &str, id: &str, patch: Value) -> RemoteResult<Value>;

    /// Delete a record, returning the backend's acknowledgement
    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<Value>;

    /// Human-readable backend name for display
    fn store_name(&self) -> &'static str;
}

/// Create the remote store described by the configuration
pub fn create_store(config: &StoreConfig) -> ElyxResult<Arc<dyn RemoteStore>> {
    match config.base_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let store = RestStore::new(url, config.api_token.clone())?;
            Ok(Arc::new(store))
        }
        _ => Err(ElyxError::StoreNotConfigured),
    }
}
