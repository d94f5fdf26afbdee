//! Cache keys

use crate::store::ListQuery;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one cached region
///
/// A list key is related to every entity key of the same collection, so a
/// settled mutation on `projects/p1` also reconciles cached project lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheKey {
    /// A single record
    Entity { collection: String, id: String },

    /// A filtered page of a collection
    List { collection: String, query: ListQuery },
}

impl CacheKey {
    pub fn entity(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Entity {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn list(collection: impl Into<String>, query: ListQuery) -> Self {
        Self::List {
            collection: collection.into(),
            query,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Entity { collection, .. } | Self::List { collection, .. } => collection,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List { .. })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity { collection, id } => write!(f, "{}/{}", collection, id),
            Self::List { collection, query } => write!(f, "{}?{}", collection, query),
        }
    }
}
