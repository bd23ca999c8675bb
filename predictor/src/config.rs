//! Runtime configuration, read once at startup.
//!
//! `<project root>/predictor.json` is optional; missing keys take their
//! defaults and `PREDICTOR_ARTIFACT_DIR` / `PREDICTOR_OUTPUT_DIR` win over
//! the file.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::highlight::Palette;
use crate::analysis::summary::SUMMARY_REASONS;
use crate::error::PredictorResult;
use crate::helper_functions::{read_json, resolve, write_json_pretty};
use crate::prediction_tools::shapley::ShapleySettings;

pub const CONFIG_FILE: &str = "predictor.json";
pub const ARTIFACT_DIR_VAR: &str = "PREDICTOR_ARTIFACT_DIR";
pub const OUTPUT_DIR_VAR: &str = "PREDICTOR_OUTPUT_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub artifact_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Reasons quoted in the summary sentence.
    pub top_contributors: usize,
    /// Features shown in the attribution charts.
    pub chart_features: usize,
    pub palette: Palette,
    pub attribution: ShapleySettings,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            output_dir: PathBuf::from("reports"),
            top_contributors: SUMMARY_REASONS,
            chart_features: 10,
            palette: Palette::default(),
            attribution: ShapleySettings::default(),
        }
    }
}

impl PredictorConfig {
    /// Load the config below `root`, apply env overrides and make paths absolute.
    pub fn load(root: &Path) -> PredictorResult<Self> {
        let path = root.join(CONFIG_FILE);
        let mut config = if path.exists() {
            info!("Reading configuration from {}", path.display());
            read_json::<PredictorConfig>(&path)?
        } else {
            info!("No {} found, using defaults", path.display());
            PredictorConfig::default()
        };

        if let Some(dir) = env::var_os(ARTIFACT_DIR_VAR) {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env::var_os(OUTPUT_DIR_VAR) {
            config.output_dir = PathBuf::from(dir);
        }

        config.artifact_dir = resolve(root, &config.artifact_dir);
        config.output_dir = resolve(root, &config.output_dir);
        Ok(config)
    }

    pub fn write_default(root: &Path) -> PredictorResult<PathBuf> {
        let path = root.join(CONFIG_FILE);
        write_json_pretty(&PredictorConfig::default(), &path)?;
        Ok(path)
    }
}
