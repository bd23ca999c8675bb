//! feature_encoding.rs – single-row model input from flags + patient record
//!
//! The row is assembled as a polars frame, dummy-encoded (drop-first),
//! reindexed onto the canonical training columns and finally scaled with the
//! fitted scaler shipped next to the classifier.

use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::{PredictorError, PredictorResult};
use crate::models::{Ethnicity, Gender, Mutation, MutationFlags, PatientRecord};

pub const AGE_COLUMN: &str = "Age";
pub const SMOKER_COLUMN: &str = "Smoker";
pub const ALCOHOLIC_COLUMN: &str = "Alcoholic";
pub const BMI_COLUMN: &str = "BMI";
pub const FAMILY_HISTORY_COLUMN: &str = "Family_history";
pub const GENDER_PREFIX: &str = "Gender";
pub const ETHNICITY_PREFIX: &str = "Ethnicity";

// ───────── scaler ─────────

/// Fitted column scaler, aligned with the canonical column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    pub fn width(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { min, .. } => min.len(),
        }
    }

    /// Both parameter vectors must have the same length.
    pub fn check(&self) -> Result<(), String> {
        let (a, b) = match self {
            Scaler::Standard { mean, scale } => (mean.len(), scale.len()),
            Scaler::MinMax { min, scale } => (min.len(), scale.len()),
        };
        if a != b {
            return Err(format!("offset has {a} entries but scale has {b}"));
        }
        Ok(())
    }

    pub fn transform(&self, row: ArrayView1<f64>) -> PredictorResult<Array1<f64>> {
        if row.len() != self.width() {
            return Err(PredictorError::Schema(format!(
                "scaler fitted on {} columns, got {}",
                self.width(),
                row.len()
            )));
        }
        let scaled = match self {
            Scaler::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(&x, (&m, &s))| {
                    // constant training columns are stored with scale 0
                    let s = if s == 0.0 { 1.0 } else { s };
                    (x - m) / s
                })
                .collect(),
            Scaler::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(&x, (&lo, &s))| x * s + lo)
                .collect(),
        };
        Ok(scaled)
    }
}

// ───────── feature vector ─────────

/// Encoded model input; `encoded` is what the user entered, `scaled` is what
/// the classifier sees.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Vec<String>,
    encoded: Array1<f64>,
    scaled: Array1<f64>,
}

impl FeatureVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn encoded(&self) -> ArrayView1<'_, f64> {
        self.encoded.view()
    }

    pub fn scaled(&self) -> ArrayView1<'_, f64> {
        self.scaled.view()
    }

    /// Unscaled value of a feature.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.encoded[i])
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in self.columns.iter().zip(self.encoded.iter()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ───────── encoder ─────────

pub struct FeatureEncoder {
    columns: Vec<String>,
    scaler: Scaler,
}

impl FeatureEncoder {
    pub fn new(columns: Vec<String>, scaler: Scaler) -> PredictorResult<Self> {
        scaler
            .check()
            .map_err(|reason| PredictorError::artifact("scaler", reason))?;
        if scaler.width() != columns.len() {
            return Err(PredictorError::artifact(
                "scaler",
                format!(
                    "fitted on {} columns but the column list has {}",
                    scaler.width(),
                    columns.len()
                ),
            ));
        }
        Ok(Self { columns, scaler })
    }

    pub fn encode(&self, flags: &MutationFlags, patient: &PatientRecord) -> PredictorResult<FeatureVector> {
        let frame = input_frame(flags, patient)?;
        let aligned = reindex(&frame, &self.columns)?;
        let encoded = first_row(&aligned)?;
        let scaled = self.scaler.transform(encoded.view())?;

        Ok(FeatureVector {
            columns: self.columns.clone(),
            encoded,
            scaled,
        })
    }
}

/// Drop-first dummy columns: the first category is the implicit reference.
fn dummy_columns(prefix: &str, categories: &[&str], value: &str) -> Vec<Column> {
    categories
        .iter()
        .skip(1)
        .map(|cat| {
            let hot = if *cat == value { 1.0 } else { 0.0 };
            Column::new(format!("{prefix}_{cat}").into(), &[hot])
        })
        .collect()
}

fn binary(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// One-row frame in the raw training layout (before reindexing).
pub fn input_frame(flags: &MutationFlags, patient: &PatientRecord) -> PolarsResult<DataFrame> {
    let mut columns: Vec<Column> = Mutation::ALL
        .iter()
        .map(|m| Column::new(m.name().into(), &[f64::from(flags.value(*m))]))
        .collect();

    columns.push(Column::new(AGE_COLUMN.into(), &[patient.age]));
    columns.push(Column::new(SMOKER_COLUMN.into(), &[binary(patient.smoker)]));
    columns.push(Column::new(ALCOHOLIC_COLUMN.into(), &[binary(patient.alcoholic)]));
    columns.push(Column::new(BMI_COLUMN.into(), &[patient.bmi]));
    columns.push(Column::new(FAMILY_HISTORY_COLUMN.into(), &[binary(patient.family_history)]));
    columns.extend(dummy_columns(GENDER_PREFIX, &Gender::CATEGORIES, patient.gender.label()));
    columns.extend(dummy_columns(ETHNICITY_PREFIX, &Ethnicity::CATEGORIES, patient.ethnicity.label()));

    DataFrame::new(columns)
}

/// Align `frame` onto `columns`: unknown columns are zero-filled, extras dropped.
pub fn reindex(frame: &DataFrame, columns: &[String]) -> PolarsResult<DataFrame> {
    let height = frame.height();
    let mut aligned = Vec::with_capacity(columns.len());

    for name in columns {
        match frame.column(name) {
            Ok(col) => aligned.push(col.cast(&DataType::Float64)?),
            Err(_) => {
                debug!("Column '{}' absent from input, filling with 0", name);
                aligned.push(Column::new(name.as_str().into(), vec![0.0f64; height]));
            }
        }
    }

    for name in frame.get_column_names() {
        if !columns.iter().any(|c| c.as_str() == name.as_str()) {
            debug!("Dropping column '{}' unknown to the model", name);
        }
    }

    DataFrame::new(aligned)
}

fn first_row(frame: &DataFrame) -> PredictorResult<Array1<f64>> {
    let mut row = Vec::with_capacity(frame.width());
    for col in frame.get_columns() {
        let value = col.f64()?.get(0).ok_or_else(|| {
            PredictorError::Schema(format!("feature '{}' has no value", col.name()))
        })?;
        row.push(value);
    }
    Ok(Array1::from(row))
}
