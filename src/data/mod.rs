//! Dataset loading and representation
//!
//! A [`Dataset`] holds an immutable feature matrix plus integer-encoded
//! class labels. CSV ingestion goes through [`DatasetReader`], which
//! validates the expected schema before anything downstream runs.

pub mod partition;

use crate::error::{CultivarError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use tracing::info;

/// In-memory tabular dataset: numeric features + one categorical label
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Vec<usize>,
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset from parts, checking shape invariants
    pub fn new(
        features: Array2<f64>,
        labels: Vec<usize>,
        feature_names: Vec<String>,
        class_names: Vec<String>,
    ) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} labels", features.nrows()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} feature names", features.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if class_names.is_empty() {
            return Err(CultivarError::DataSchema(
                "dataset has no classes".to_string(),
            ));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= class_names.len()) {
            return Err(CultivarError::DataSchema(format!(
                "label index {} out of range for {} classes",
                bad,
                class_names.len()
            )));
        }

        Ok(Self {
            features,
            labels,
            feature_names,
            class_names,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Per-class sample counts
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.class_names.len()];
        for &l in &self.labels {
            counts[l] += 1;
        }
        counts
    }

    /// Copy out the rows named by `indices`
    pub fn subset(&self, indices: &[usize]) -> (Array2<f64>, Vec<usize>) {
        let x = self.features.select(ndarray::Axis(0), indices);
        let y = indices.iter().map(|&i| self.labels[i]).collect();
        (x, y)
    }
}

/// Reader that loads and schema-checks a CSV file into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DatasetReader {
    label_column: String,
    feature_columns: Option<Vec<String>>,
    allowed_labels: Option<Vec<String>>,
}

impl DatasetReader {
    /// Create a reader for a table whose label lives in `label_column`
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            feature_columns: None,
            allowed_labels: None,
        }
    }

    /// Restrict features to the named columns (default: every numeric
    /// column except the label)
    pub fn with_feature_columns(mut self, columns: Vec<String>) -> Self {
        self.feature_columns = Some(columns);
        self
    }

    /// Require label values to come from this closed set
    pub fn with_allowed_labels(mut self, labels: Vec<String>) -> Self {
        self.allowed_labels = Some(labels);
        self
    }

    /// Load a CSV file
    pub fn read_csv(&self, path: &str) -> Result<Dataset> {
        let file = File::open(path)
            .map_err(|e| CultivarError::Data(format!("cannot open {}: {}", path, e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| CultivarError::Data(e.to_string()))?;

        let dataset = self.from_dataframe(&df)?;
        info!(
            path = %path,
            samples = dataset.n_samples(),
            features = dataset.n_features(),
            classes = dataset.n_classes(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Validate the schema of an already-loaded frame and convert it
    pub fn from_dataframe(&self, df: &DataFrame) -> Result<Dataset> {
        if df.height() == 0 {
            return Err(CultivarError::DataSchema("table has no rows".to_string()));
        }

        let feature_names: Vec<String> = match &self.feature_columns {
            Some(cols) => {
                for name in cols {
                    if df.column(name).is_err() {
                        return Err(CultivarError::DataSchema(format!(
                            "missing feature column '{}'",
                            name
                        )));
                    }
                }
                cols.clone()
            }
            None => df
                .get_column_names()
                .into_iter()
                .filter(|name| name.as_str() != self.label_column)
                .filter(|name| {
                    df.column(name.as_str())
                        .map(|c| is_numeric_dtype(c.dtype()))
                        .unwrap_or(false)
                })
                .map(|s| s.to_string())
                .collect(),
        };

        if feature_names.is_empty() {
            return Err(CultivarError::DataSchema(
                "no numeric feature columns found".to_string(),
            ));
        }

        let n_rows = df.height();
        let mut col_data: Vec<Vec<f64>> = Vec::with_capacity(feature_names.len());
        for name in &feature_names {
            let column = df
                .column(name)
                .map_err(|_| CultivarError::DataSchema(format!("missing feature column '{}'", name)))?;

            if !is_numeric_dtype(column.dtype()) {
                return Err(CultivarError::DataSchema(format!(
                    "feature column '{}' has non-numeric type {}",
                    name,
                    column.dtype()
                )));
            }
            if column.null_count() > 0 {
                return Err(CultivarError::DataSchema(format!(
                    "feature column '{}' has {} missing values",
                    name,
                    column.null_count()
                )));
            }

            let values: Vec<f64> = column
                .cast(&DataType::Float64)
                .map_err(|e| CultivarError::Data(e.to_string()))?
                .f64()
                .map_err(|e| CultivarError::Data(e.to_string()))?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            col_data.push(values);
        }

        let features =
            Array2::from_shape_fn((n_rows, feature_names.len()), |(r, c)| col_data[c][r]);

        let (labels, class_names) = self.extract_labels(df)?;

        Dataset::new(features, labels, feature_names, class_names)
    }

    fn extract_labels(&self, df: &DataFrame) -> Result<(Vec<usize>, Vec<String>)> {
        let column = df.column(&self.label_column).map_err(|_| {
            CultivarError::DataSchema(format!("missing label column '{}'", self.label_column))
        })?;

        if column.null_count() > 0 {
            return Err(CultivarError::DataSchema(format!(
                "label column '{}' has {} missing values",
                self.label_column,
                column.null_count()
            )));
        }

        let as_str = column
            .cast(&DataType::String)
            .map_err(|e| CultivarError::Data(e.to_string()))?;
        let raw: Vec<String> = as_str
            .as_materialized_series()
            .str()
            .map_err(|e| CultivarError::Data(e.to_string()))?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect();

        let class_names: Vec<String> = match &self.allowed_labels {
            Some(allowed) => {
                for value in &raw {
                    if !allowed.contains(value) {
                        return Err(CultivarError::DataSchema(format!(
                            "label column '{}' contains unexpected value '{}'",
                            self.label_column, value
                        )));
                    }
                }
                allowed.clone()
            }
            None => {
                let mut distinct: Vec<String> = raw.clone();
                distinct.sort();
                distinct.dedup();
                distinct
            }
        };

        let labels: Vec<usize> = raw
            .iter()
            .map(|v| {
                class_names
                    .iter()
                    .position(|c| c == v)
                    .expect("label value verified against class set")
            })
            .collect();

        Ok((labels, class_names))
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}
