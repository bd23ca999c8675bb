//! batch.rs – score every row of a patient CSV
//!
//! The CSV follows the training layout (`DNA_sequence`, `Age`, `Gender`,
//! `Ethnicity`/`Ethinicity`, `Smoker`, `Alcoholic`, `BMI`, `Family_history`).
//! Rows that fail validation or parsing are kept in the output with their
//! error instead of aborting the run.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::data_handling::patient_input::parse_request;
use crate::error::PredictorResult;
use crate::helper_functions::read_csv;
use crate::models::Mutation;
use crate::mutation_detection::MIN_SEQUENCE_LENGTH;
use crate::pipeline::{Diagnosis, Predictor};

pub const SEQUENCE_COLUMN: &str = "DNA_sequence";

pub struct BatchDataset {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub rows: usize,
    pub scored: usize,
    pub failed: usize,
}

impl BatchDataset {
    pub fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading data from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read batch CSV: {}", e);
                return Err(e);
            }
        };
        if df.column(SEQUENCE_COLUMN).is_err() {
            return Err(PolarsError::ColumnNotFound(
                format!("batch input needs a '{SEQUENCE_COLUMN}' column").into(),
            ));
        }
        Ok(df)
    }
}

fn any_value_to_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::Float32(v) => json!(v),
        AnyValue::Float64(v) => json!(v),
        other => Value::String(other.to_string()),
    }
}

/// Row `idx` as a flat JSON object keyed by column name.
fn row_fields(df: &DataFrame, idx: usize) -> PolarsResult<Map<String, Value>> {
    let mut fields = Map::new();
    for col in df.get_columns() {
        fields.insert(col.name().to_string(), any_value_to_json(col.get(idx)?));
    }
    Ok(fields)
}

/// Count rows whose sequence cannot be scored at all.
fn count_short_sequences(df: &DataFrame) -> PolarsResult<usize> {
    let lengths = df
        .clone()
        .lazy()
        .select([col(SEQUENCE_COLUMN).str().len_chars().alias("length")])
        .collect()?;
    let short = lengths
        .column("length")?
        .u32()?
        .into_iter()
        .filter(|len| len.map_or(true, |l| (l as usize) < MIN_SEQUENCE_LENGTH))
        .count();
    Ok(short)
}

/// Score every row; returns one output row per input row plus run statistics.
pub fn score_frame(predictor: &Predictor, df: &DataFrame) -> PredictorResult<(DataFrame, BatchStats)> {
    let rows = df.height();
    let short = count_short_sequences(df)?;
    if short > 0 {
        warn!("{} of {} rows have sequences shorter than {} bases", short, rows, MIN_SEQUENCE_LENGTH);
    }

    let mut stats = BatchStats {
        rows,
        ..BatchStats::default()
    };
    let mut outcomes: Vec<Result<Diagnosis, String>> = Vec::with_capacity(rows);

    for idx in 0..rows {
        let fields = row_fields(df, idx)?;
        let outcome = parse_request(&Value::Object(fields)).and_then(|req| predictor.predict(&req));
        match outcome {
            Ok(diagnosis) => {
                stats.scored += 1;
                outcomes.push(Ok(diagnosis));
            }
            Err(e) => {
                warn!("Row {}: {}", idx, e);
                stats.failed += 1;
                outcomes.push(Err(e.to_string()));
            }
        }
    }

    let mut columns: Vec<Column> = Vec::new();
    columns.push(Column::new("row".into(), (0..rows as u32).collect::<Vec<u32>>()));
    columns.push(Column::new(
        "status".into(),
        outcomes
            .iter()
            .map(|o| match o {
                Ok(_) => "ok".to_string(),
                Err(e) => e.clone(),
            })
            .collect::<Vec<String>>(),
    ));

    for m in Mutation::ALL {
        let values: Vec<Option<u32>> = outcomes
            .iter()
            .map(|o| o.as_ref().ok().map(|d| u32::from(d.flags.value(m))))
            .collect();
        columns.push(Column::new(m.name().into(), values));
    }

    let predicted: Vec<Option<String>> = outcomes
        .iter()
        .map(|o| o.as_ref().ok().map(|d| d.prediction.predicted_class.clone()))
        .collect();
    columns.push(Column::new("predicted_class".into(), predicted));

    for (class_idx, class) in predictor.classes().iter().enumerate() {
        let probs: Vec<Option<f64>> = outcomes
            .iter()
            .map(|o| o.as_ref().ok().map(|d| d.prediction.probabilities[class_idx]))
            .collect();
        columns.push(Column::new(format!("p_{class}").into(), probs));
    }

    let summaries: Vec<Option<String>> = outcomes
        .iter()
        .map(|o| o.as_ref().ok().map(|d| d.summary.clone()))
        .collect();
    columns.push(Column::new("summary".into(), summaries));

    info!(
        "Scored {} of {} rows ({} failed)",
        stats.scored, stats.rows, stats.failed
    );
    Ok((DataFrame::new(columns)?, stats))
}

pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "batch".to_string());
    output_dir.join(format!("{stem}_predictions.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper_functions::write_csv;
    use crate::pipeline::tests::stub_predictor;
    use polars::df;

    fn batch_frame() -> DataFrame {
        let long = "A".repeat(300);
        df![
            "DNA_sequence" => [long.as_str(), "ACGT", long.as_str()],
            "Age" => [45i64, 52, 38],
            "Gender" => ["Male", "Female", "Female"],
            "Ethinicity" => ["Caucasian", "Asian", "Other"],
            "Smoker" => [0i64, 1, 1],
            "Alcoholic" => [0i64, 0, 1],
            "BMI" => [24.5, 30.1, 22.0],
            "Family_history" => [0i64, 1, 0]
        ]
        .unwrap()
    }

    #[test]
    fn failures_are_reported_per_row() {
        let predictor = stub_predictor(vec![0.2, 0.5, 0.3]);
        let (out, stats) = score_frame(&predictor, &batch_frame()).unwrap();

        assert_eq!(stats, BatchStats { rows: 3, scored: 2, failed: 1 });
        assert_eq!(out.height(), 3);

        let status = out.column("status").unwrap().str().unwrap();
        assert_eq!(status.get(0), Some("ok"));
        assert!(status.get(1).unwrap().contains("at least 300"));

        let class = out.column("predicted_class").unwrap().str().unwrap();
        assert_eq!(class.get(0), Some("Diabetes"));
        assert_eq!(class.get(1), None);

        let m1 = out.column("m1").unwrap().u32().unwrap();
        assert_eq!(m1.get(2), Some(1));
        assert!(out.column("p_Healthy").is_ok());
    }

    #[test]
    fn short_sequences_are_counted() {
        assert_eq!(count_short_sequences(&batch_frame()).unwrap(), 1);
    }

    #[test]
    fn loads_csv_and_requires_sequence_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.csv");
        write_csv(&mut batch_frame(), &path).unwrap();
        let df = BatchDataset { path: path.clone() }.load().unwrap();
        assert_eq!(df.height(), 3);

        let mut no_seq = batch_frame().drop("DNA_sequence").unwrap();
        write_csv(&mut no_seq, &path).unwrap();
        assert!(BatchDataset { path }.load().is_err());
    }

    #[test]
    fn output_is_named_after_input() {
        let out = output_path(Path::new("/tmp/out"), Path::new("data/XAI-dataset.csv"));
        assert_eq!(out, PathBuf::from("/tmp/out/XAI-dataset_predictions.csv"));
    }
}
