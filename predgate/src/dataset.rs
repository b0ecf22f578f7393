//! Tabular batches in pandas "split" JSON orientation.
//!
//! A batch arrives as `{"columns": [...], "index": [...], "data": [[...], ...]}`. The `index`
//! array is optional; when present it labels each row and those labels are carried through to
//! the per-row messages. The column set is only known at runtime, so cells and index labels
//! stay as [`serde_json::Value`] and are passed through untouched.
//!
//! After inference, [`merge_predictions`] appends a `prediction` column and returns a
//! [`PredictedDataset`], whose rows can be rendered one at a time as notification messages.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Media type of split-oriented batches, both inbound and towards the inference endpoint.
pub const PANDAS_SPLIT_MEDIA_TYPE: &str = "application/json; format=pandas-split";

/// Name of the column added by [`merge_predictions`].
pub const PREDICTION_COLUMN: &str = "prediction";

/// Integer class labels returned by the model, one per row.
pub type Predictions = Vec<i64>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{0}")]
    Malformed(#[from] serde_json::Error),

    #[error("row {row} has {actual} values but {expected} columns are declared")]
    RaggedRow { row: usize, expected: usize, actual: usize },

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("column 'prediction' is reserved for model output")]
    ReservedColumn,

    #[error("index has {actual} labels but there are {rows} rows")]
    IndexLength { rows: usize, actual: usize },

    #[error("received {predictions} predictions for {rows} rows")]
    LengthMismatch { rows: usize, predictions: usize },
}

/// An ordered batch of rows sharing one column schema.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<Vec<Value>>,
    data: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, data: Vec<Vec<Value>>) -> Result<Self, DatasetError> {
        let dataset = Self {
            columns,
            index: None,
            data,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Label rows with `index` instead of their positions.
    pub fn with_index(self, index: Vec<Value>) -> Result<Self, DatasetError> {
        let dataset = Self {
            index: Some(index),
            ..self
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Parse and validate a split-JSON batch.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DatasetError> {
        let dataset: Self = serde_json::from_slice(bytes)?;
        dataset.validate()?;
        Ok(dataset)
    }

    fn validate(&self) -> Result<(), DatasetError> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column == PREDICTION_COLUMN {
                return Err(DatasetError::ReservedColumn);
            }
            if !seen.insert(column.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.clone()));
            }
        }

        if let Some(index) = &self.index
            && index.len() != self.data.len()
        {
            return Err(DatasetError::IndexLength {
                rows: self.data.len(),
                actual: index.len(),
            });
        }

        for (row, values) in self.data.iter().enumerate() {
            if values.len() != self.columns.len() {
                return Err(DatasetError::RaggedRow {
                    row,
                    expected: self.columns.len(),
                    actual: values.len(),
                });
            }
        }

        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.data
    }

    pub fn index(&self) -> Option<&[Value]> {
        self.index.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A batch with the `prediction` column attached, row `i` carrying `predictions[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedDataset {
    columns: Vec<String>,
    index: Option<Vec<Value>>,
    data: Vec<Vec<Value>>,
    predictions: Predictions,
}

/// Attach `predictions` to `dataset` by row position.
///
/// The counts must match exactly; nothing is truncated or padded.
pub fn merge_predictions(dataset: Dataset, predictions: &[i64]) -> Result<PredictedDataset, DatasetError> {
    if predictions.len() != dataset.len() {
        return Err(DatasetError::LengthMismatch {
            rows: dataset.len(),
            predictions: predictions.len(),
        });
    }

    let Dataset {
        mut columns,
        index,
        mut data,
    } = dataset;
    columns.push(PREDICTION_COLUMN.to_string());
    for (row, prediction) in data.iter_mut().zip(predictions) {
        row.push(Value::from(*prediction));
    }

    Ok(PredictedDataset {
        columns,
        index,
        data,
        predictions: predictions.to_vec(),
    })
}

impl PredictedDataset {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn predictions(&self) -> &[i64] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rows in input order.
    pub fn rows(&self) -> impl Iterator<Item = PredictedRow<'_>> {
        self.data
            .iter()
            .zip(&self.predictions)
            .enumerate()
            .map(|(position, (values, prediction))| PredictedRow {
                position,
                columns: &self.columns,
                label: self.index.as_ref().and_then(|index| index.get(position)),
                values,
                prediction: *prediction,
            })
    }
}

/// One merged row, borrowed from its [`PredictedDataset`].
#[derive(Debug, Clone, Copy)]
pub struct PredictedRow<'a> {
    pub position: usize,
    pub columns: &'a [String],
    /// Caller-supplied index label, if the batch carried an `index`.
    pub label: Option<&'a Value>,
    /// Feature values followed by the prediction.
    pub values: &'a [Value],
    pub prediction: i64,
}

#[derive(Serialize)]
struct SingleRowSplit<'a> {
    columns: &'a [String],
    index: [Value; 1],
    data: [&'a [Value]; 1],
}

impl PredictedRow<'_> {
    /// Render the row as a one-row split-JSON frame. The index is the caller's label for the
    /// row, or its position in the batch when no index was sent.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        let index = self.label.cloned().unwrap_or_else(|| Value::from(self.position));
        serde_json::to_string(&SingleRowSplit {
            columns: self.columns,
            index: [index],
            data: [self.values],
        })
    }
}
