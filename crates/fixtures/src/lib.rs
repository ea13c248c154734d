//! Fixture settings as used by light cues.
//!
//! A light cue stores its state as "light command text": one `key = value` line per fixture
//! attribute (`front.wash.red = 255`). This crate holds the in-memory form of that text
//! ([`FixtureMap`]), the codec between the two, and the max-wins merge used when several
//! scenes fire at the same time.

use indexmap::map::{IntoIter, Iter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use codec::{decode, encode, FixtureError};
pub use merge::{merge_max, FixtureConflict, MergedFixtures};

mod codec;
mod merge;

/// Fixture attribute values keyed by attribute name, in insertion order.
///
/// Keys are case-sensitive and stored trimmed. Values are usually in the 0-255 range but are not
/// clamped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureMap(IndexMap<String, i32>);

impl FixtureMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        self.0.get(key).copied()
    }

    /// Sets a value. An existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: i32) -> Option<i32> {
        self.0.insert(key.into(), value)
    }

    /// Removes a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<i32> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, i32> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, i32)> for FixtureMap {
    fn from_iter<I: IntoIterator<Item = (K, i32)>>(iter: I) -> Self {
        let mut map = FixtureMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K: Into<String>> Extend<(K, i32)> for FixtureMap {
    fn extend<I: IntoIterator<Item = (K, i32)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for FixtureMap {
    type Item = (String, i32);
    type IntoIter = IntoIter<String, i32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FixtureMap {
    type Item = (&'a String, &'a i32);
    type IntoIter = Iter<'a, String, i32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position_of_existing_key() {
        let mut map: FixtureMap = [("a", 1), ("b", 2)].into_iter().collect();
        map.insert("a", 10);

        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(10));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut map: FixtureMap = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.remove("b"), Some(2));

        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let map: FixtureMap = [("wash.red", 255), ("wash.blue", 0)].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"wash.red":255,"wash.blue":0}"#);

        let back: FixtureMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
