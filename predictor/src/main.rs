use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::analysis::report::write_report;
use crate::config::PredictorConfig;
use crate::data_handling::artifacts::ArtifactBundle;
use crate::data_handling::batch::{output_path, score_frame, BatchDataset};
use crate::data_handling::patient_input::read_request;
use crate::helper_functions::{project_root, write_csv};
use crate::pipeline::Predictor;

mod analysis;
mod config;
mod data_handling;
mod error;
mod feature_encoding;
mod helper_functions;
mod models;
mod mutation_detection;
mod pipeline;
mod prediction_tools;

const USAGE: &str = "usage: predictor <init | predict <request.json> | batch <input.csv>>";

fn load_predictor(config: &PredictorConfig) -> Result<Predictor> {
    let bundle = ArtifactBundle::load(&config.artifact_dir).with_context(|| {
        format!(
            "loading model artifacts from {}",
            config.artifact_dir.display()
        )
    })?;
    Ok(Predictor::from_artifacts(bundle, config)?)
}

fn run_predict(config: &PredictorConfig, request_path: PathBuf) -> Result<()> {
    let predictor = load_predictor(config)?;
    let request = read_request(&request_path)
        .with_context(|| format!("reading request {}", request_path.display()))?;

    let diagnosis = predictor.predict(&request)?;
    let report = write_report(&config.output_dir, &diagnosis, config.chart_features)?;

    println!("Final Prediction: {}", diagnosis.prediction.predicted_class);
    for (class, p) in diagnosis.prediction.iter() {
        println!("  {class}: {p:.3}");
    }
    println!("{}", diagnosis.summary);
    println!("Report: {}", report.display());
    Ok(())
}

fn run_batch(config: &PredictorConfig, input: PathBuf) -> Result<()> {
    let predictor = load_predictor(config)?;
    let df = BatchDataset { path: input.clone() }
        .load()
        .with_context(|| format!("reading batch input {}", input.display()))?;

    let (mut scored, stats) = score_frame(&predictor, &df)?;
    std::fs::create_dir_all(&config.output_dir)?;
    let out = output_path(&config.output_dir, &input);
    write_csv(&mut scored, &out)?;

    println!(
        "Scored {}/{} rows ({} failed) -> {}",
        stats.scored,
        stats.rows,
        stats.failed,
        out.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let root = project_root();
    let mut args = env::args().skip(1);
    let command = args.next().unwrap_or_default();

    if command == "init" {
        let path = PredictorConfig::write_default(&root)?;
        info!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = PredictorConfig::load(&root)?;
    info!("Starting the DNA disease predictor");

    let result = match (command.as_str(), args.next()) {
        ("predict", Some(path)) => run_predict(&config, PathBuf::from(path)),
        ("batch", Some(path)) => run_batch(&config, PathBuf::from(path)),
        _ => bail!(USAGE),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
