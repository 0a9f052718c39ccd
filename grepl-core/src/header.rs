//! # Headers
//!
//! The mutable header multimap attached as metadata to every outgoing call.
//!
//! Keys are restricted to ASCII letters, digits, `-`, `_` and `.`. A key that is already
//! present is accepted as-is even if it would not pass that check, so entries loaded
//! before the rule existed keep working. Values are de-duplicated per key and keep their
//! insertion order.
use std::collections::BTreeMap;
use std::str::FromStr;
use tonic::metadata::{
    AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue, MetadataMap,
    errors::{InvalidMetadataKey, InvalidMetadataValue},
};

/// Set by the transport itself; user supplied values would be ignored or clash.
const RESERVED_KEYS: &[&str] = &["user-agent"];

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("Invalid header key '{0}': only letters, digits, '-', '_' and '.' are allowed")]
    InvalidKey(String),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `key`.
    ///
    /// Reserved keys are dropped with a warning and still return `Ok`.
    pub fn add(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        if RESERVED_KEYS.iter().any(|r| r.eq_ignore_ascii_case(key)) {
            tracing::warn!(key, "header is reserved by the transport, ignoring it");
            return Ok(());
        }

        let values = match self.entries.get_mut(key) {
            Some(values) => values,
            None if is_valid_key(key) => self.entries.entry(key.to_string()).or_default(),
            None => return Err(HeaderError::InvalidKey(key.to_string())),
        };

        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
        Ok(())
    }

    /// Removes every value stored under `key`.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the tonic metadata for an outgoing call.
    ///
    /// Keys ending in `-bin` carry the raw bytes of the value.
    pub fn to_metadata(&self) -> Result<MetadataMap, HeaderError> {
        let mut metadata = MetadataMap::new();

        for (key, values) in self.entries() {
            if key.ends_with("-bin") {
                let k = BinaryMetadataKey::from_str(key).map_err(|source| {
                    HeaderError::InvalidMetadataKey {
                        key: key.to_string(),
                        source,
                    }
                })?;
                for v in values {
                    metadata.append_bin(k.clone(), BinaryMetadataValue::from_bytes(v.as_bytes()));
                }
                continue;
            }

            let k = AsciiMetadataKey::from_str(key).map_err(|source| {
                HeaderError::InvalidMetadataKey {
                    key: key.to_string(),
                    source,
                }
            })?;
            for v in values {
                let val = AsciiMetadataValue::from_str(v).map_err(|source| {
                    HeaderError::InvalidMetadataValue {
                        key: key.to_string(),
                        source,
                    }
                })?;
                metadata.append(k.clone(), val);
            }
        }

        Ok(metadata)
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_appends_and_deduplicates() {
        let mut headers = Headers::new();
        headers.add("x-token", "a").unwrap();
        headers.add("x-token", "b").unwrap();
        headers.add("x-token", "a").unwrap();

        assert_eq!(
            headers.get("x-token").unwrap(),
            &["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn reserved_key_is_ignored_without_error() {
        let mut headers = Headers::new();
        headers.add("user-agent", "x").unwrap();

        assert!(headers.is_empty());
    }

    #[test]
    fn reserved_key_is_matched_regardless_of_case() {
        let mut headers = Headers::new();
        headers.add("User-Agent", "x").unwrap();
        headers.add("USER-AGENT", "y").unwrap();

        assert!(headers.is_empty());
        assert!(headers.to_metadata().unwrap().get("user-agent").is_none());
    }

    #[test]
    fn invalid_key_is_rejected() {
        let mut headers = Headers::new();

        assert!(matches!(
            headers.add("a/b", "x"),
            Err(HeaderError::InvalidKey(key)) if key == "a/b"
        ));
        assert!(headers.add("", "x").is_err());
    }

    #[test]
    fn existing_key_bypasses_validation() {
        let mut headers = Headers {
            entries: BTreeMap::from([("a/b".to_string(), vec!["x".to_string()])]),
        };

        headers.add("a/b", "y").unwrap();

        assert_eq!(
            headers.get("a/b").unwrap(),
            &["x".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn remove_drops_every_value() {
        let mut headers = Headers::new();
        headers.add("k", "1").unwrap();
        headers.add("k", "2").unwrap();
        headers.remove("k");

        assert!(headers.get("k").is_none());
    }

    #[test]
    fn entries_are_sorted_by_key() {
        let mut headers = Headers::new();
        headers.add("zeta", "1").unwrap();
        headers.add("alpha", "2").unwrap();
        headers.add("mid.key", "3").unwrap();

        let keys: Vec<_> = headers.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha", "mid.key", "zeta"]);
    }

    #[test]
    fn metadata_keeps_every_value() {
        let mut headers = Headers::new();
        headers.add("x-id", "1").unwrap();
        headers.add("x-id", "2").unwrap();
        headers.add("trace-bin", "raw").unwrap();

        let metadata = headers.to_metadata().unwrap();

        let ids: Vec<_> = metadata
            .get_all("x-id")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(
            metadata.get_bin("trace-bin").unwrap().to_bytes().unwrap(),
            "raw".as_bytes()
        );
    }

    #[test]
    fn metadata_rejects_non_ascii_values() {
        let mut headers = Headers::new();
        headers.add("x-name", "ü\n").unwrap();

        assert!(matches!(
            headers.to_metadata(),
            Err(HeaderError::InvalidMetadataValue { key, .. }) if key == "x-name"
        ));
    }
}
