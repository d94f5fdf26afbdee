//! Optimistic cache synchronization
//!
//! Keeps an in-memory keyed cache of fetched records consistent with the
//! remote store across concurrent edits.
//!
//! # Entry States
//!
//! | State | `peek` | `read` |
//! |-------|--------|--------|
//! | Missing | `None` | fetch |
//! | Fresh | value | value |
//! | Stale | last-known value | refetch |
//! | Optimistic | expected value | expected value |

pub mod cache;
pub mod key;
pub mod mutation;
pub mod synchronizer;

pub use cache::{CacheEntry, QueryCache, Rollback};
pub use key::CacheKey;
pub use mutation::{
    merge_patch, MutationOutcome, MutationPlan, MutationReceipt, OptimisticUpdate,
    PendingMutation, RemoteRequest, SettleReport,
};
pub use synchronizer::Synchronizer;
