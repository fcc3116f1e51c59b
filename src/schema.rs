//! Schema definition for the expected shape of ingested data.
//!
//! The schema declares column names and types, partitions columns into
//! numerical and categorical sets, and carries the drift threshold used by
//! validation. It is loaded once per run and never mutated afterwards.

use crate::error::{ClaimflowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Integer-valued numerical column.
    Int,
    /// Floating-point numerical column.
    Float,
    /// String-valued categorical column.
    Categorical,
}

impl ColumnType {
    /// Whether the column participates in numerical checks (drift, scaling).
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Check whether a raw value is coercible to this type.
    ///
    /// Integers are accepted for float columns (widening), but floats are
    /// not accepted for int columns.
    #[must_use]
    pub fn is_coercible(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            Self::Categorical => value.is_string(),
        }
    }

    /// Coerce a raw value to `f64` for numerical processing.
    ///
    /// Returns `None` for values this type cannot represent.
    #[must_use]
    pub fn as_f64(&self, value: &serde_json::Value) -> Option<f64> {
        if !self.is_coercible(value) {
            return None;
        }
        value.as_f64()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Categorical => "categorical",
        };
        write!(f, "{s}")
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name as it appears in the document store.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Create a column spec.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    /// Check one raw value against the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::SchemaMismatch`] naming the column when the
    /// value is not coercible. Validation folds this into its report rather
    /// than letting it escape the stage.
    pub fn check_value(&self, value: &serde_json::Value) -> Result<()> {
        if self.column_type.is_coercible(value) {
            Ok(())
        } else {
            Err(ClaimflowError::SchemaMismatch {
                column: self.name.clone(),
                reason: format!("value {value} not coercible to {}", self.column_type),
            })
        }
    }
}

/// The full schema for one pipeline run.
///
/// Column order is significant: the transformation stage derives its feature
/// layout from it, and that layout must be identical between fit and
/// inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered column declarations, including the label column.
    pub columns: Vec<ColumnSpec>,
    /// Name of the label column.
    pub label: String,
    /// Advisory drift threshold for numerical columns (relative mean shift).
    pub drift_threshold: f64,
}

impl Schema {
    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Feature columns in declared order (everything except the label).
    pub fn feature_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(move |c| c.name != self.label)
    }

    /// Numerical column names in declared order, label excluded.
    #[must_use]
    pub fn numerical_columns(&self) -> Vec<&str> {
        self.feature_columns()
            .filter(|c| c.column_type.is_numerical())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Categorical column names in declared order.
    #[must_use]
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.feature_columns()
            .filter(|c| c.column_type == ColumnType::Categorical)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Validate the schema itself before the run starts.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Config`] on empty columns, duplicate names,
    /// an unknown or categorical label column, or a negative drift threshold.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(ClaimflowError::Config(
                "schema declares no columns".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(ClaimflowError::Config(format!(
                    "duplicate column '{}' in schema",
                    col.name
                )));
            }
        }

        match self.column(&self.label) {
            None => {
                return Err(ClaimflowError::Config(format!(
                    "label column '{}' not declared in schema",
                    self.label
                )));
            }
            Some(spec) if !spec.column_type.is_numerical() => {
                return Err(ClaimflowError::Config(format!(
                    "label column '{}' must be numerical, got {}",
                    self.label, spec.column_type
                )));
            }
            Some(_) => {}
        }

        if self.feature_columns().next().is_none() {
            return Err(ClaimflowError::Config(
                "schema declares no feature columns besides the label".to_string(),
            ));
        }

        if self.drift_threshold < 0.0 || !self.drift_threshold.is_finite() {
            return Err(ClaimflowError::Config(format!(
                "drift threshold must be a non-negative finite number, got {}",
                self.drift_threshold
            )));
        }

        Ok(())
    }
}
