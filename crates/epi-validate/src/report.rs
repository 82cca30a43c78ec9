use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Result, ValidateError};

/// One finding of the anomaly detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    MissingColumns { columns: Vec<String> },
    NullColumn { column: String },
    ZeroColumn { column: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns { columns } => {
                write!(f, "missing columns from schema: {}", columns.join(", "))
            }
            Self::NullColumn { column } => write!(f, "null column detected: {column}"),
            Self::ZeroColumn { column } => write!(f, "all-zeroes column detected: {column}"),
        }
    }
}

/// What to do with findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyAction {
    #[default]
    Warn,
    Raise,
}

/// Findings for one table or one key partition of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyReport {
    pub scope: String,
    pub anomalies: Vec<Anomaly>,
}

impl AnomalyReport {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            anomalies: Vec::new(),
        }
    }

    pub fn add(&mut self, anomaly: Anomaly) {
        self.anomalies.push(anomaly);
    }

    pub fn extend(&mut self, anomalies: impl IntoIterator<Item = Anomaly>) {
        self.anomalies.extend(anomalies);
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Log every finding, or fail on the first one when `action` is
    /// [`AnomalyAction::Raise`].
    pub fn apply(&self, action: AnomalyAction) -> Result<()> {
        for anomaly in &self.anomalies {
            match action {
                AnomalyAction::Warn => warn!(scope = %self.scope, "{anomaly}"),
                AnomalyAction::Raise => {
                    return Err(ValidateError::Anomaly {
                        scope: self.scope.clone(),
                        message: anomaly.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
