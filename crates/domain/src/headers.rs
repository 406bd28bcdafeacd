// crates/domain/src/headers.rs

//! Meta-information attached to content items.
//!
//! Keys are stored lower-cased so every lookup is case-insensitive. For
//! HTTP-backed providers these are the response headers of the called
//! service; other providers may put whatever metadata they like in here.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Headers {
    entries: Arc<BTreeMap<String, Vec<String>>>,
}

impl Headers {
    pub fn empty() -> Self {
        Headers::default()
    }

    /// Builds headers from `(key, values)` pairs.
    ///
    /// Keys differing only in case are folded into one entry; their values
    /// are appended in iteration order.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, values) in entries {
            map.entry(key.as_ref().to_lowercase())
                .or_default()
                .extend(values.into_iter().map(Into::<String>::into));
        }
        Headers {
            entries: Arc::new(map),
        }
    }

    /// Convenience for the common one-value-per-key case.
    pub fn single<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Headers::new(
            entries
                .into_iter()
                .map(|(k, v)| (k, vec![Into::<String>::into(v)])),
        )
    }

    /// First value for `key`, if any.
    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.get_values(key).first().map(String::as_str)
    }

    /// All values for `key`; empty when the key is absent.
    pub fn get_values(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of `self` and `other`. On key collision the value list of
    /// `other` replaces the one in `self` (last writer wins).
    pub fn merge(&self, other: &Headers) -> Headers {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut map = (*self.entries).clone();
        for (key, values) in other.entries.iter() {
            map.insert(key.clone(), values.clone());
        }
        Headers {
            entries: Arc::new(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let headers = Headers::single([("Content-Type", "text/html")]);

        assert_eq!(headers.get_value("content-type"), Some("text/html"));
        assert_eq!(headers.get_value("CONTENT-TYPE"), Some("text/html"));
        assert!(headers.contains_key("Content-type"));
        assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["content-type"]);
    }

    #[test]
    fn absent_keys_yield_empty_values() {
        let headers = Headers::empty();

        assert!(headers.get_values("x-missing").is_empty());
        assert_eq!(headers.get_value("x-missing"), None);
    }

    #[test]
    fn keys_differing_in_case_are_folded() {
        let headers = Headers::new([
            ("Set-Cookie", vec!["a=1"]),
            ("set-cookie", vec!["b=2", "c=3"]),
        ]);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_values("SET-COOKIE"), ["a=1", "b=2", "c=3"]);
    }

    #[test]
    fn merge_is_last_writer_wins_per_key() {
        let first = Headers::new([
            ("Cache-Control", vec!["max-age=60"]),
            ("X-Foo", vec!["foo"]),
        ]);
        let second = Headers::new([("cache-control", vec!["no-cache", "no-store"])]);

        let merged = first.merge(&second);

        assert_eq!(merged.get_values("cache-control"), ["no-cache", "no-store"]);
        assert_eq!(merged.get_value("x-foo"), Some("foo"));
        // inputs are untouched
        assert_eq!(first.get_value("cache-control"), Some("max-age=60"));
    }
}
