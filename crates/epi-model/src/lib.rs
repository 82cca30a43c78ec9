pub mod error;
pub mod key;
pub mod record;
pub mod schema;

pub use error::{ModelError, Result};
pub use key::{KeyLevel, key_level, parent_key};
pub use record::{Criterion, KeyResolution, LocationField, MergeRecord};
pub use schema::{ColumnType, Schema, SchemaColumn};

/// Column holding the ISO-8601 observation date.
pub const DATE_COLUMN: &str = "date";
/// Column holding the canonical entity key.
pub const KEY_COLUMN: &str = "key";
/// Free-text column used by the fuzzy stages of key resolution.
pub const MATCH_STRING_COLUMN: &str = "match_string";
/// Regular-expression column of the metadata table.
pub const MATCH_REGEX_COLUMN: &str = "match_regex";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_exposes_key() {
        let resolved = KeyResolution::Resolved("US_CA".to_string());
        assert_eq!(resolved.key(), Some("US_CA"));
        assert!(resolved.is_resolved());
        assert_eq!(KeyResolution::Ambiguous(3).key(), None);
    }

    #[test]
    fn schema_serializes() {
        let schema = Schema::from_pairs([("date", "str"), ("key", "str"), ("total", "int")])
            .expect("valid schema");
        let json = serde_json::to_string(&schema).expect("serialize schema");
        let round: Schema = serde_json::from_str(&json).expect("deserialize schema");
        assert_eq!(round, schema);
    }
}
