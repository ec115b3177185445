//! Ordered episode map
//!
//! Episodes are keyed by their number as a string, but the source does not
//! agree with itself on zero padding. Keys are therefore kept exactly as they
//! appear in the document, in document order, and lookups are exact.

use super::Episode;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Episodes of one arc, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeMap {
    entries: Vec<(String, Episode)>,
}

impl EpisodeMap {
    /// Exact key lookup; the first entry wins if a key appears twice
    pub fn get(&self, key: &str) -> Option<(&str, &Episode)> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(key, episode)| (key.as_str(), episode))
    }

    /// Looks up an episode number, zero-padded to two digits first, then unpadded
    pub fn get_number(&self, number: u32) -> Option<(&str, &Episode)> {
        self.get(&format!("{number:02}"))
            .or_else(|| self.get(&number.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Episode)> {
        self.entries
            .iter()
            .map(|(key, episode)| (key.as_str(), episode))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Episode)> for EpisodeMap {
    fn from_iter<I: IntoIterator<Item = (K, Episode)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, episode)| (key.into(), episode))
                .collect(),
        }
    }
}

impl Serialize for EpisodeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(key, episode)| (key, episode)))
    }
}

impl<'de> Deserialize<'de> for EpisodeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EpisodeMapVisitor;

        impl<'de> Visitor<'de> for EpisodeMapVisitor {
            type Value = EpisodeMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of episode keys to episodes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<EpisodeMap, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, episode)) = access.next_entry::<String, Episode>()? {
                    entries.push((key, episode));
                }
                Ok(EpisodeMap { entries })
            }
        }

        deserializer.deserialize_map(EpisodeMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(crc: &str) -> Episode {
        Episode {
            crc32: Some(crc.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_preserves_document_order() {
        let map: EpisodeMap = serde_json::from_str(r#"{"10": {}, "02": {}, "1": {}}"#).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["10", "02", "1"]);
    }

    #[test]
    fn test_get_number_prefers_padded_key() {
        let map: EpisodeMap = [("1", episode("AAAAAAAA")), ("01", episode("BBBBBBBB"))]
            .into_iter()
            .collect();

        let (key, found) = map.get_number(1).unwrap();
        assert_eq!(key, "01");
        assert_eq!(found.crc32.as_deref(), Some("BBBBBBBB"));
    }

    #[test]
    fn test_get_number_falls_back_to_unpadded() {
        let map: EpisodeMap = [("7", episode("AAAAAAAA"))].into_iter().collect();
        assert_eq!(map.get_number(7).unwrap().0, "7");
        assert!(map.get_number(8).is_none());
    }

    #[test]
    fn test_three_digit_numbers() {
        let map: EpisodeMap = [("100", episode("AAAAAAAA"))].into_iter().collect();
        assert_eq!(map.get_number(100).unwrap().0, "100");
    }

    #[test]
    fn test_rejects_non_map() {
        let result: Result<EpisodeMap, _> = serde_json::from_str("[1, 2]");
        assert!(result.is_err());
    }
}
