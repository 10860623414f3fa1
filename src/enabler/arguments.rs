//! Execute arguments
//!
//! An execute payload is an ordered map of single-digit keys to optional
//! text values, e.g. `0='reset',2`. Empty payloads are valid; most actions
//! take none.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AccessError, Result};

/// Arguments passed to an execute operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arguments {
    entries: BTreeMap<u8, Option<String>>,
}

impl Arguments {
    /// No arguments.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add an argument (builder style). Keys are single digits 0-9.
    pub fn with(mut self, key: u8, value: Option<String>) -> Self {
        self.entries.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Value for a key; outer `None` means the key is absent.
    pub fn get(&self, key: u8) -> Option<&Option<String>> {
        self.entries.get(&key)
    }

    /// Parse the text form: comma-separated `digit` or `digit='text'` items.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::none());
        }
        let mut entries = BTreeMap::new();
        for item in text.split(',') {
            let item = item.trim();
            let (key_part, value) = match item.split_once('=') {
                None => (item, None),
                Some((key, quoted)) => {
                    let quoted = quoted.trim();
                    if quoted.len() < 2 || !quoted.starts_with('\'') || !quoted.ends_with('\'') {
                        return Err(AccessError::bad_request(format!(
                            "argument value must be quoted: {}",
                            item
                        )));
                    }
                    (key.trim(), Some(quoted[1..quoted.len() - 1].to_string()))
                }
            };
            if key_part.len() != 1 || !key_part.chars().all(|c| c.is_ascii_digit()) {
                return Err(AccessError::bad_request(format!(
                    "argument key must be a single digit: {}",
                    item
                )));
            }
            let key = key_part.as_bytes()[0] - b'0';
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            match value {
                None => write!(f, "{}", key)?,
                Some(v) => write!(f, "{}='{}'", key, v)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert!(Arguments::parse("").unwrap().is_empty());
        assert!(Arguments::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_bare_keys_and_values() {
        let args = Arguments::parse("0='hard',2").unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get(0), Some(&Some("hard".to_string())));
        assert_eq!(args.get(2), Some(&None));
        assert_eq!(args.get(1), None);
    }

    #[test]
    fn test_parse_rejects_multi_digit_key() {
        assert!(Arguments::parse("10").is_err());
        assert!(Arguments::parse("a='x'").is_err());
    }

    #[test]
    fn test_parse_rejects_unquoted_value() {
        assert!(Arguments::parse("0=hard").is_err());
        assert!(Arguments::parse("0='hard").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let args = Arguments::none()
            .with(0, Some("hard".into()))
            .with(3, None);
        let text = args.to_string();
        assert_eq!(text, "0='hard',3");
        assert_eq!(Arguments::parse(&text).unwrap(), args);
    }
}
