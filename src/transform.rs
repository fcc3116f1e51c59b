//! Feature transformation: cleaning, encoding, and scaling.
//!
//! The transformation is fitted on the training partition only and then
//! applied to both partitions, so no information leaks from the test rows
//! into the fitted parameters. The fitted object records every category
//! vocabulary, every scaling factor, and the exact output column order, so
//! it can transform unseen single rows at inference time without access to
//! the original training data.

use crate::config::TransformConfig;
use crate::dataset::{DatasetSplit, Row};
use crate::error::{ClaimflowError, Result};
use crate::schema::{ColumnType, Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fitted standard-scaling parameters for one numerical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    /// Column name.
    pub column: String,
    /// Mean of the training values.
    pub mean: f64,
    /// Population standard deviation of the training values.
    pub std_dev: f64,
}

impl NumericScaler {
    /// Scale a raw value. A constant column (zero deviation) maps to 0.
    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        if self.std_dev == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std_dev
        }
    }
}

/// Fitted one-hot vocabulary for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// Column name.
    pub column: String,
    /// Sorted category vocabulary seen in the training partition.
    pub vocabulary: Vec<String>,
    /// Whether unseen categories map to a dedicated trailing slot.
    pub unknown_bucket: bool,
}

impl CategoryEncoder {
    /// Number of output feature slots this encoder produces.
    #[must_use]
    pub fn width(&self) -> usize {
        self.vocabulary.len() + usize::from(self.unknown_bucket)
    }

    /// One-hot index for a category value.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Transformation`] for an unseen category
    /// when no unknown bucket is configured.
    pub fn index_of(&self, value: &str) -> Result<usize> {
        match self.vocabulary.binary_search_by(|v| v.as_str().cmp(value)) {
            Ok(idx) => Ok(idx),
            Err(_) if self.unknown_bucket => Ok(self.vocabulary.len()),
            Err(_) => Err(ClaimflowError::Transformation(format!(
                "unseen category '{}' in column '{}'",
                value, self.column
            ))),
        }
    }
}

/// The fitted, reusable transformation object.
///
/// `feature_names` is the exact output column order used during fitting;
/// any later inference pass reproduces it from this struct alone. Changing
/// that order between fit and inference silently corrupts predictions,
/// which is why it is recorded rather than re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    /// Fitted scalers, in schema feature order.
    pub scalers: Vec<NumericScaler>,
    /// Fitted encoders, in schema feature order.
    pub encoders: Vec<CategoryEncoder>,
    /// Schema feature columns in declared order, with each column's type.
    pub columns: Vec<(String, ColumnType)>,
    /// Output feature names in exact matrix order.
    pub feature_names: Vec<String>,
    /// Label column name.
    pub label: String,
}

impl FittedTransform {
    /// Fit the transformation on the training partition only.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Transformation`] if a training value is
    /// missing or not coercible to its declared type.
    pub fn fit(schema: &Schema, train: &[Row], config: &TransformConfig) -> Result<Self> {
        let mut scalers = Vec::new();
        let mut encoders = Vec::new();
        let mut columns = Vec::new();
        let mut feature_names = Vec::new();

        for spec in schema.feature_columns() {
            columns.push((spec.name.clone(), spec.column_type));
            match spec.column_type {
                ColumnType::Int | ColumnType::Float => {
                    let mut sum = 0.0;
                    let mut values = Vec::with_capacity(train.len());
                    for row in train {
                        let v = numeric_value(row, &spec.name, spec.column_type)?;
                        sum += v;
                        values.push(v);
                    }
                    let n = values.len() as f64;
                    let mean = if values.is_empty() { 0.0 } else { sum / n };
                    let variance = if values.is_empty() {
                        0.0
                    } else {
                        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
                    };
                    scalers.push(NumericScaler {
                        column: spec.name.clone(),
                        mean,
                        std_dev: variance.sqrt(),
                    });
                    feature_names.push(spec.name.clone());
                }
                ColumnType::Categorical => {
                    let mut seen = BTreeSet::new();
                    for row in train {
                        seen.insert(category_value(row, &spec.name)?.to_string());
                    }
                    let vocabulary: Vec<String> = seen.into_iter().collect();
                    for category in &vocabulary {
                        feature_names.push(format!("{}={}", spec.name, category));
                    }
                    if config.unknown_category_bucket {
                        feature_names.push(format!("{}=<unknown>", spec.name));
                    }
                    encoders.push(CategoryEncoder {
                        column: spec.name.clone(),
                        vocabulary,
                        unknown_bucket: config.unknown_category_bucket,
                    });
                }
            }
        }

        Ok(Self {
            scalers,
            encoders,
            columns,
            feature_names,
            label: schema.label.clone(),
        })
    }

    /// Width of the output feature vector.
    #[must_use]
    pub fn feature_width(&self) -> usize {
        self.feature_names.len()
    }

    /// Transform one raw row into a feature vector in the fitted order.
    ///
    /// Deterministic: applying the same fitted object to the same row always
    /// yields the same vector.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Transformation`] on a missing value, an
    /// uncoercible value, or an unseen category without a fallback bucket.
    pub fn apply(&self, row: &Row) -> Result<Vec<f64>> {
        let mut features = Vec::with_capacity(self.feature_width());
        let mut scaler_iter = self.scalers.iter();
        let mut encoder_iter = self.encoders.iter();

        for (name, column_type) in &self.columns {
            match column_type {
                ColumnType::Int | ColumnType::Float => {
                    let scaler = scaler_iter
                        .next()
                        .ok_or_else(|| corrupt_transform(name))?;
                    let v = numeric_value(row, name, *column_type)?;
                    features.push(scaler.scale(v));
                }
                ColumnType::Categorical => {
                    let encoder = encoder_iter
                        .next()
                        .ok_or_else(|| corrupt_transform(name))?;
                    let value = category_value(row, name)?;
                    let hot = encoder.index_of(value)?;
                    let base = features.len();
                    features.resize(base + encoder.width(), 0.0);
                    features[base + hot] = 1.0;
                }
            }
        }

        Ok(features)
    }

    /// Extract the label from a raw row as `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Transformation`] if the label is missing
    /// or not numerical.
    pub fn label_of(&self, row: &Row) -> Result<f64> {
        row.get(&self.label)
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                ClaimflowError::Transformation(format!(
                    "label column '{}' missing or not numerical",
                    self.label
                ))
            })
    }

    /// Transform a partition into a feature matrix plus a label vector.
    ///
    /// # Errors
    ///
    /// Propagates the first row-level transformation failure.
    pub fn apply_partition(&self, rows: &[Row]) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        let mut matrix = Vec::with_capacity(rows.len());
        let mut labels = Vec::with_capacity(rows.len());
        for row in rows {
            matrix.push(self.apply(row)?);
            labels.push(self.label_of(row)?);
        }
        Ok((matrix, labels))
    }
}

fn corrupt_transform(column: &str) -> ClaimflowError {
    ClaimflowError::Transformation(format!(
        "fitted transform is internally inconsistent at column '{column}'"
    ))
}

fn numeric_value(row: &Row, column: &str, column_type: ColumnType) -> Result<f64> {
    let value = row.get(column).ok_or_else(|| {
        ClaimflowError::Transformation(format!("column '{column}' missing from row"))
    })?;
    column_type.as_f64(value).ok_or_else(|| {
        ClaimflowError::Transformation(format!(
            "value {value} in column '{column}' is not coercible to {column_type}"
        ))
    })
}

fn category_value<'a>(row: &'a Row, column: &str) -> Result<&'a str> {
    row.get(column)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            ClaimflowError::Transformation(format!(
                "column '{column}' missing from row or not a string"
            ))
        })
}

/// Model-ready matrices for both partitions plus the fitted transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformedDataset {
    /// Training feature matrix.
    pub x_train: Vec<Vec<f64>>,
    /// Training labels.
    pub y_train: Vec<f64>,
    /// Test feature matrix.
    pub x_test: Vec<Vec<f64>>,
    /// Test labels.
    pub y_test: Vec<f64>,
    /// The fitted transformation object, reusable at inference time.
    pub transform: FittedTransform,
}

/// Run the transformation stage: fit on train, apply to both partitions.
///
/// # Errors
///
/// Returns [`ClaimflowError::Transformation`] on any fit or apply failure.
pub fn transform_split(
    split: &DatasetSplit,
    schema: &Schema,
    config: &TransformConfig,
) -> Result<TransformedDataset> {
    let transform = FittedTransform::fit(schema, &split.train, config)?;
    let (x_train, y_train) = transform.apply_partition(&split.train)?;
    let (x_test, y_test) = transform.apply_partition(&split.test)?;
    Ok(TransformedDataset {
        x_train,
        y_train,
        x_test,
        y_test,
        transform,
    })
}
