// crates/domain/src/parameters.rs

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

static EMPTY: LazyLock<Parameters> = LazyLock::new(|| Parameters {
    values: Arc::new(BTreeMap::new()),
});

/// Immutable request context threaded through every fetch.
///
/// Cloning is a reference-count bump; `with` copies on write so a derived
/// value never affects the one it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: Arc<BTreeMap<String, Json>>,
}

impl Parameters {
    /// The shared empty parameters value.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    /// Returns a copy of `self` with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Parameters {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.values.get(key)
    }

    /// String value for `key`; `None` when absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Json::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Json)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<Json>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Parameters {
            values: Arc::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}
