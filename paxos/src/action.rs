use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A write agreed on by the cluster and applied to every replica's map.
///
/// Two actions are equal when they carry the same operation, key and value,
/// which is how a proposer tells whether its own write was the one chosen.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Insert or overwrite `key` with `value`.
    Put {
        /// Target key.
        key: String,
        /// New value.
        value: String,
    },
    /// Remove `key` if present.
    Delete {
        /// Target key.
        key: String,
    },
}

impl Action {
    /// Builds a put of `value` under `key`.
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Action::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a delete of `key`.
    pub fn delete(key: impl Into<String>) -> Self {
        Action::Delete { key: key.into() }
    }

    /// The key this action writes.
    pub fn key(&self) -> &str {
        match self {
            Action::Put { key, .. } | Action::Delete { key } => key,
        }
    }

    /// Applies the action to a key-value map. Applying the same action
    /// twice leaves the map as applying it once.
    pub fn apply(&self, store: &mut HashMap<String, String>) {
        match self {
            Action::Put { key, value } => {
                store.insert(key.clone(), value.clone());
            }
            Action::Delete { key } => {
                store.remove(key);
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Put { key, value } => write!(f, "PUT [{}] = {}", key, value),
            Action::Delete { key } => write!(f, "DELETE [{}]", key),
        }
    }
}
