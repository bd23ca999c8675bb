//! artifacts.rs – the trained-model bundle, loaded once before serving
//!
//! Load order is fixed: column list → label encoder → scaler → network, each
//! checked against what was loaded before it. Any failure is fatal.

use std::collections::HashSet;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, PredictorResult};
use crate::feature_encoding::Scaler;
use crate::helper_functions::read_json;
use crate::prediction_tools::dense_network::{DenseNetwork, NetworkSpec};

pub const COLUMNS_FILE: &str = "x_columns.json";
pub const LABELS_FILE: &str = "label_encoder.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";

/// Class names in model-output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub columns: Vec<String>,
    pub classes: Vec<String>,
    pub scaler: Scaler,
    pub network: DenseNetwork,
}

fn read_artifact<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> PredictorResult<T> {
    let path = dir.join(file);
    read_json(&path).map_err(|e| PredictorError::artifact(file, format!("{}: {e}", path.display())))
}

fn check_unique(artifact: &str, what: &str, names: &[String]) -> PredictorResult<()> {
    if names.is_empty() {
        return Err(PredictorError::artifact(artifact, format!("no {what}")));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(PredictorError::artifact(artifact, format!("duplicate {what} '{dup}'")));
    }
    Ok(())
}

impl ArtifactBundle {
    pub fn load(dir: &Path) -> PredictorResult<Self> {
        info!("Loading model artifacts from {}", dir.display());

        let columns: Vec<String> = read_artifact(dir, COLUMNS_FILE)?;
        check_unique(COLUMNS_FILE, "feature column", &columns)?;
        info!("{} feature columns", columns.len());

        let labels: LabelEncoder = read_artifact(dir, LABELS_FILE)?;
        check_unique(LABELS_FILE, "class", &labels.classes)?;
        info!("{} classes: {:?}", labels.classes.len(), labels.classes);

        let scaler: Scaler = read_artifact(dir, SCALER_FILE)?;
        let spec: NetworkSpec = read_artifact(dir, MODEL_FILE)?;
        let network = DenseNetwork::from_spec(spec)?;

        let bundle = Self {
            columns,
            classes: labels.classes,
            scaler,
            network,
        };
        bundle.validate()?;
        info!(
            "Model artifacts ready ({} → {} network)",
            bundle.network.input_width(),
            bundle.network.output_width()
        );
        Ok(bundle)
    }

    /// All four artifacts must describe the same training run.
    pub fn validate(&self) -> PredictorResult<()> {
        self.scaler
            .check()
            .map_err(|reason| PredictorError::artifact(SCALER_FILE, reason))?;
        if self.scaler.width() != self.columns.len() {
            return Err(PredictorError::artifact(
                SCALER_FILE,
                format!(
                    "fitted on {} columns, column list has {}",
                    self.scaler.width(),
                    self.columns.len()
                ),
            ));
        }
        if self.network.input_width() != self.columns.len() {
            return Err(PredictorError::artifact(
                MODEL_FILE,
                format!(
                    "network takes {} inputs, column list has {}",
                    self.network.input_width(),
                    self.columns.len()
                ),
            ));
        }
        if self.network.output_width() != self.classes.len() {
            return Err(PredictorError::artifact(
                MODEL_FILE,
                format!(
                    "network yields {} outputs for {} classes",
                    self.network.output_width(),
                    self.classes.len()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helper_functions::write_json_pretty;
    use crate::prediction_tools::dense_network::{Activation, DenseLayerSpec};

    /// Small but complete bundle: 14 canonical columns, 3 classes.
    pub(crate) fn write_bundle(dir: &Path) {
        let columns = crate::feature_encoding::tests::canonical_columns();
        let width = columns.len();
        let hidden = 4;

        let layers = vec![
            DenseLayerSpec {
                weights: (0..width)
                    .map(|i| (0..hidden).map(|j| ((i + j) % 3) as f64 * 0.1 - 0.1).collect())
                    .collect(),
                biases: vec![0.05; hidden],
                activation: Activation::Relu,
            },
            DenseLayerSpec {
                weights: (0..hidden)
                    .map(|i| (0..3).map(|j| if i % 3 == j { 0.8 } else { -0.2 }).collect())
                    .collect(),
                biases: vec![0.0, 0.1, -0.1],
                activation: Activation::Softmax,
            },
        ];

        write_json_pretty(&columns, &dir.join(COLUMNS_FILE)).unwrap();
        write_json_pretty(
            &LabelEncoder {
                classes: vec!["Cancer".into(), "Diabetes".into(), "Healthy".into()],
            },
            &dir.join(LABELS_FILE),
        )
        .unwrap();
        write_json_pretty(
            &Scaler::Standard {
                mean: vec![0.5; width],
                scale: vec![2.0; width],
            },
            &dir.join(SCALER_FILE),
        )
        .unwrap();
        write_json_pretty(&NetworkSpec { layers }, &dir.join(MODEL_FILE)).unwrap();
    }

    #[test]
    fn loads_consistent_bundle() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        let bundle = ArtifactBundle::load(dir.path()).unwrap();
        assert_eq!(bundle.columns.len(), 14);
        assert_eq!(bundle.classes, vec!["Cancer", "Diabetes", "Healthy"]);
    }

    #[test]
    fn missing_file_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        std::fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();
        match ArtifactBundle::load(dir.path()) {
            Err(PredictorError::Artifact { artifact, .. }) => assert_eq!(artifact, SCALER_FILE),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn class_count_must_match_network() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        write_json_pretty(
            &LabelEncoder {
                classes: vec!["Cancer".into(), "Healthy".into()],
            },
            &dir.path().join(LABELS_FILE),
        )
        .unwrap();
        assert!(matches!(
            ArtifactBundle::load(dir.path()),
            Err(PredictorError::Artifact { .. })
        ));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        let mut columns = crate::feature_encoding::tests::canonical_columns();
        columns[1] = "m1".into();
        write_json_pretty(&columns, &dir.path().join(COLUMNS_FILE)).unwrap();
        assert!(ArtifactBundle::load(dir.path()).is_err());
    }
}
