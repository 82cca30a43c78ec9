//! Canonical entity keys.
//!
//! Keys are hierarchical by string prefix: `US` (country), `US_CA`
//! (subregion 1) and `US_CA_06037` (subregion 2).

use std::fmt;

use crate::{ModelError, Result};

/// Aggregation level of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyLevel {
    Country,
    Subregion1,
    Subregion2,
}

impl fmt::Display for KeyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Country => "country",
            Self::Subregion1 => "subregion1",
            Self::Subregion2 => "subregion2",
        };
        f.write_str(label)
    }
}

/// Returns the aggregation level of `key`.
///
/// ```
/// use epi_model::{KeyLevel, key_level};
///
/// assert_eq!(key_level("US").unwrap(), KeyLevel::Country);
/// assert_eq!(key_level("US_CA").unwrap(), KeyLevel::Subregion1);
/// assert_eq!(key_level("US_CA_06037").unwrap(), KeyLevel::Subregion2);
/// assert!(key_level("").is_err());
/// ```
pub fn key_level(key: &str) -> Result<KeyLevel> {
    let segments: Vec<&str> = key.split('_').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ModelError::InvalidKey(key.to_string()));
    }
    match segments.len() {
        1 => Ok(KeyLevel::Country),
        2 => Ok(KeyLevel::Subregion1),
        3 => Ok(KeyLevel::Subregion2),
        _ => Err(ModelError::InvalidKey(key.to_string())),
    }
}

/// Returns the key one level up, or `None` for country keys and invalid keys.
pub fn parent_key(key: &str) -> Option<&str> {
    match key_level(key).ok()? {
        KeyLevel::Country => None,
        KeyLevel::Subregion1 | KeyLevel::Subregion2 => key.rsplit_once('_').map(|(head, _)| head),
    }
}
