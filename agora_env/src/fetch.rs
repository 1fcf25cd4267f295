//! Tagged results for read-type gateway calls.
//!
//! Recommendation gateways distinguish three outcomes that callers branch on:
//! a non-empty result, an empty result (nothing to act on), and a failure
//! (transport error or an error payload from the service). None of them is
//! an exception; the caller decides whether to skip.

use crate::EnvError;

/// Outcome of a gateway read.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Non-empty payload
    Found(T),

    /// The call succeeded but returned nothing usable
    Empty,

    /// Transport failure or error payload
    Failed(EnvError),
}

impl<T> Fetched<T> {
    /// Returns the payload if one was found.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl<T> Fetched<Vec<T>> {
    /// Tags a list: empty lists become `Empty`.
    pub fn from_list(items: Vec<T>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Found(items)
        }
    }

    /// Tags a fallible list read.
    pub fn from_result(result: Result<Vec<T>, EnvError>) -> Self {
        match result {
            Ok(items) => Self::from_list(items),
            Err(e) => Self::Failed(e),
        }
    }
}

impl<K, V> Fetched<std::collections::HashMap<K, V>> {
    /// Tags a weight map: empty maps become `Empty`.
    pub fn from_map(map: std::collections::HashMap<K, V>) -> Self {
        if map.is_empty() {
            Self::Empty
        } else {
            Self::Found(map)
        }
    }
}
