//! Schema-driven validation of an ingested dataset.
//!
//! Three checks run against both partitions: the column-set check (no
//! missing or extra columns), the type check (every value coercible to its
//! declared type), and the drift check (relative mean shift of numerical
//! columns between partitions). The first two decide the verdict; drift
//! findings are advisory only — they are recorded in the report but never
//! close the gate on their own. Promoting drift to a hard failure is a
//! deliberate deviation an operator must make in
//! [`ValidationReport::passed`].
//!
//! Schema mismatches never escape as raw errors; they are folded into the
//! report, and a negative report halts the pipeline via
//! [`ClaimflowError::Halted`].

use crate::dataset::{DatasetSplit, Row};
use crate::error::{ClaimflowError, Result};
use crate::schema::Schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// One finding from validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Column the finding concerns.
    pub column: String,
    /// Human-readable reason.
    pub reason: String,
    /// Advisory findings are recorded but do not fail the gate.
    pub advisory: bool,
}

impl ValidationIssue {
    fn hard(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reason: reason.into(),
            advisory: false,
        }
    }

    fn advisory(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reason: reason.into(),
            advisory: true,
        }
    }
}

/// Verdict plus findings for one ingested dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Logical AND of the column-set and type checks.
    pub passed: bool,
    /// All findings, hard and advisory.
    pub issues: Vec<ValidationIssue>,
    /// When validation ran.
    pub checked_at: DateTime<Utc>,
}

impl ValidationReport {
    /// One-line summary for logs and error messages.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.passed {
            let drift = self.issues.len();
            if drift == 0 {
                "passed".to_string()
            } else {
                format!("passed with {drift} advisory finding(s)")
            }
        } else {
            let hard = self.issues.iter().filter(|i| !i.advisory).count();
            let columns: Vec<&str> = self
                .issues
                .iter()
                .filter(|i| !i.advisory)
                .map(|i| i.column.as_str())
                .collect();
            format!("failed with {hard} issue(s) in [{}]", columns.join(", "))
        }
    }

    /// Enforce the gate: pass the report through on success, halt the
    /// pipeline otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Halted`] carrying this report when the
    /// verdict is negative.
    pub fn into_gate(self) -> Result<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(ClaimflowError::Halted {
                report: Box::new(self),
            })
        }
    }
}

/// Validate an ingested split against the schema.
#[must_use]
pub fn validate(split: &DatasetSplit, schema: &Schema) -> ValidationReport {
    let mut issues = Vec::new();

    check_partition(&split.train, schema, "train", &mut issues);
    check_partition(&split.test, schema, "test", &mut issues);
    check_drift(split, schema, &mut issues);

    let passed = issues.iter().all(|i| i.advisory);
    if !passed {
        warn!(issues = issues.len(), "validation gate rejected dataset");
    }

    ValidationReport {
        passed,
        issues,
        checked_at: Utc::now(),
    }
}

/// Column-set and type checks for one partition.
///
/// Type problems surface from [`crate::schema::ColumnSpec::check_value`] as
/// [`ClaimflowError::SchemaMismatch`] and are folded into hard issues here;
/// the raw error never crosses the stage boundary.
fn check_partition(
    rows: &[Row],
    schema: &Schema,
    partition: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut missing: BTreeSet<&str> = BTreeSet::new();
    let mut extra: BTreeSet<String> = BTreeSet::new();
    let mut mistyped: BTreeMap<&str, String> = BTreeMap::new();

    for row in rows {
        for spec in &schema.columns {
            match row.get(&spec.name) {
                None => {
                    missing.insert(spec.name.as_str());
                }
                Some(value) => {
                    if let Err(ClaimflowError::SchemaMismatch { reason, .. }) =
                        spec.check_value(value)
                    {
                        mistyped.entry(spec.name.as_str()).or_insert(reason);
                    }
                }
            }
        }
        for key in row.keys() {
            if schema.column(key).is_none() {
                extra.insert(key.clone());
            }
        }
    }

    for column in missing {
        issues.push(ValidationIssue::hard(
            column,
            format!("missing from {partition} partition"),
        ));
    }
    for column in extra {
        issues.push(ValidationIssue::hard(
            column,
            format!("present in {partition} partition but not declared in schema"),
        ));
    }
    for (column, reason) in mistyped {
        issues.push(ValidationIssue::hard(
            column,
            format!("{reason} in {partition} partition"),
        ));
    }
}

/// Advisory drift check: relative mean shift of numerical columns.
fn check_drift(split: &DatasetSplit, schema: &Schema, issues: &mut Vec<ValidationIssue>) {
    for column in schema.numerical_columns() {
        let Some(spec) = schema.column(column) else {
            continue;
        };
        let (Some(train_mean), Some(test_mean)) = (
            partition_mean(&split.train, column, spec.column_type),
            partition_mean(&split.test, column, spec.column_type),
        ) else {
            // Type or presence problems are already reported as hard issues.
            continue;
        };

        let scale = train_mean.abs().max(1e-9);
        let shift = (train_mean - test_mean).abs() / scale;
        if shift > schema.drift_threshold {
            issues.push(ValidationIssue::advisory(
                column,
                format!(
                    "mean shifted {:.4} between partitions (threshold {:.4})",
                    shift, schema.drift_threshold
                ),
            ));
        }
    }
}

fn partition_mean(
    rows: &[Row],
    column: &str,
    column_type: crate::schema::ColumnType,
) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let mut sum = 0.0;
    for row in rows {
        sum += column_type.as_f64(row.get(column)?)?;
    }
    Some(sum / rows.len() as f64)
}
