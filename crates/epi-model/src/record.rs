//! Loosely identified records handed to key resolution.

use std::fmt;

/// What a record says about one location field.
///
/// `Unset` means the source does not carry the field at all and imposes no
/// restriction. `Null` means the source explicitly reports "no value", which
/// only matches metadata rows that are also null there. An empty `Value`
/// behaves like `Unset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Criterion {
    #[default]
    Unset,
    Null,
    Value(String),
}

impl Criterion {
    /// Build a criterion from a present column cell.
    pub fn from_cell(value: Option<&str>) -> Self {
        match value {
            None => Self::Null,
            Some(value) => Self::Value(value.to_string()),
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Value(value) => Some(value.as_str()),
            Self::Unset | Self::Null => None,
        }
    }

    /// Whether this criterion narrows the candidate set.
    pub fn is_restrictive(&self) -> bool {
        match self {
            Self::Unset => false,
            Self::Null => true,
            Self::Value(value) => !value.is_empty(),
        }
    }
}

/// The six location columns used by hierarchical filtering, in the order
/// they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationField {
    CountryCode,
    CountryName,
    Subregion1Code,
    Subregion1Name,
    Subregion2Code,
    Subregion2Name,
}

impl LocationField {
    pub const ALL: [LocationField; 6] = [
        Self::CountryCode,
        Self::CountryName,
        Self::Subregion1Code,
        Self::Subregion1Name,
        Self::Subregion2Code,
        Self::Subregion2Name,
    ];

    /// Subregion fields compared against the fuzzy `match_string`.
    pub const SUBREGIONS: [LocationField; 4] = [
        Self::Subregion1Code,
        Self::Subregion1Name,
        Self::Subregion2Code,
        Self::Subregion2Name,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::CountryCode => "country_code",
            Self::CountryName => "country_name",
            Self::Subregion1Code => "subregion1_code",
            Self::Subregion1Name => "subregion1_name",
            Self::Subregion2Code => "subregion2_code",
            Self::Subregion2Name => "subregion2_name",
        }
    }

    /// Position of this field in [`LocationField::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::CountryCode => 0,
            Self::CountryName => 1,
            Self::Subregion1Code => 2,
            Self::Subregion1Name => 3,
            Self::Subregion2Code => 4,
            Self::Subregion2Name => 5,
        }
    }
}

/// An adapter row reduced to the fields key resolution looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MergeRecord {
    pub key: Option<String>,
    criteria: [Criterion; 6],
    pub match_string: Option<String>,
}

impl MergeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_match_string(mut self, value: impl Into<String>) -> Self {
        self.match_string = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_value(mut self, field: LocationField, value: impl Into<String>) -> Self {
        self.set(field, Criterion::Value(value.into()));
        self
    }

    #[must_use]
    pub fn with_null(mut self, field: LocationField) -> Self {
        self.set(field, Criterion::Null);
        self
    }

    pub fn set(&mut self, field: LocationField, criterion: Criterion) {
        self.criteria[field.index()] = criterion;
    }

    pub fn get(&self, field: LocationField) -> &Criterion {
        &self.criteria[field.index()]
    }

    /// Iterate location criteria in filtering order.
    pub fn criteria(&self) -> impl Iterator<Item = (LocationField, &Criterion)> {
        LocationField::ALL
            .into_iter()
            .map(move |field| (field, self.get(field)))
    }
}

impl fmt::Display for MergeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(key) = &self.key {
            parts.push(format!("key={key}"));
        }
        for (field, criterion) in self.criteria() {
            match criterion {
                Criterion::Unset => {}
                Criterion::Null => parts.push(format!("{}=null", field.column_name())),
                Criterion::Value(value) => {
                    parts.push(format!("{}={value:?}", field.column_name()));
                }
            }
        }
        if let Some(value) = &self.match_string {
            parts.push(format!("match_string={value:?}"));
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Outcome of resolving one [`MergeRecord`].
///
/// Only `Resolved` carries a key; the other variants say why the record was
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResolution {
    Resolved(String),
    /// An explicit key was given but is not in the metadata table.
    UnknownKey(String),
    /// No rule produced a candidate.
    NoCandidate,
    /// The best rule left more than one candidate.
    Ambiguous(usize),
}

impl KeyResolution {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Resolved(key) => Some(key.as_str()),
            _ => None,
        }
    }

    pub fn into_key(self) -> Option<String> {
        match self {
            Self::Resolved(key) => Some(key),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}
