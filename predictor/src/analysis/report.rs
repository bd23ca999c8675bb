//! Writes one diagnosis to disk: HTML page, charts, attributions CSV, JSON.

use std::fmt::Write as _;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{error, info};

use crate::analysis::charts::{
    draw_force_chart, draw_importance_chart, draw_probability_chart, draw_signed_chart,
};
use crate::error::PredictorResult;
use crate::helper_functions::{write_csv, write_json_pretty};
use crate::models::AttributionResult;
use crate::pipeline::Diagnosis;

pub const PROBABILITY_CHART: &str = "probabilities.svg";
pub const IMPORTANCE_CHART: &str = "feature_importance.svg";
pub const SIGNED_CHART: &str = "feature_impact.svg";
pub const FORCE_CHART: &str = "feature_force.svg";
pub const ATTRIBUTIONS_CSV: &str = "attributions.csv";
pub const DIAGNOSIS_JSON: &str = "diagnosis.json";
pub const REPORT_HTML: &str = "report.html";

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `**bold**` → `<strong>bold</strong>` on already-escaped text.
fn emphasis(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, part) in text.split("**").enumerate() {
        if i % 2 == 1 {
            let _ = write!(out, "<strong>{part}</strong>");
        } else {
            out.push_str(part);
        }
    }
    out
}

/// Feature table sorted by |attribution|, with the value the user entered.
pub fn attributions_frame(diagnosis: &Diagnosis) -> PolarsResult<DataFrame> {
    let attribution: &AttributionResult = &diagnosis.attribution;
    let mut rows: Vec<(&str, f64)> = attribution.iter().collect();
    rows.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let names: Vec<&str> = rows.iter().map(|(n, _)| *n).collect();
    let values: Vec<f64> = rows
        .iter()
        .map(|(n, _)| diagnosis.features.value(n).unwrap_or(0.0))
        .collect();
    let contributions: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();

    df![
        "feature" => names,
        "value" => values,
        "attribution" => contributions
    ]
}

pub fn render_html(diagnosis: &Diagnosis) -> String {
    let prediction = &diagnosis.prediction;
    let mut html = String::new();

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html><head><meta charset='utf-8'><title>DNA Disease Prediction</title></head><body>");
    let _ = writeln!(html, "<h1>DNA Disease Prediction with Explainability</h1>");
    let _ = writeln!(
        html,
        "<p><strong>Final Prediction: {}</strong></p>",
        escape(&prediction.predicted_class)
    );

    let _ = writeln!(html, "<h2>DNA Mutation Map</h2>");
    let _ = writeln!(
        html,
        "<div style='font-family:monospace; word-wrap:break-word;'>{}</div>",
        diagnosis.highlighted_sequence
    );
    let _ = writeln!(html, "<p><em>Coloured regions indicate detected mutations in the DNA sequence.</em></p>");

    let _ = writeln!(html, "<h2>Prediction Probabilities</h2><ul>");
    for (class, p) in prediction.iter() {
        let _ = writeln!(html, "<li>{}: {:.3}</li>", escape(class), p);
    }
    let _ = writeln!(html, "</ul><img src='{PROBABILITY_CHART}' alt='probabilities'>");

    let _ = writeln!(html, "<h2>Explanation</h2>");
    let _ = writeln!(html, "<p>{}</p>", emphasis(&escape(&diagnosis.summary)));

    let _ = writeln!(html, "<h2>Feature Importance</h2>");
    let _ = writeln!(html, "<img src='{IMPORTANCE_CHART}' alt='feature importance'>");
    let _ = writeln!(
        html,
        "<p>Baseline for {}: {:.4}</p>",
        escape(&prediction.predicted_class),
        diagnosis.attribution.baseline
    );
    let _ = writeln!(html, "<h2>Feature Impact (Positive / Negative)</h2>");
    let _ = writeln!(html, "<img src='{SIGNED_CHART}' alt='feature impact'>");
    let _ = writeln!(html, "<h2>Feature Impact on Prediction (Force Plot)</h2>");
    let _ = writeln!(html, "<img src='{FORCE_CHART}' alt='force plot'>");
    let _ = writeln!(html, "</body></html>");
    html
}

/// Write every report artefact below `output_dir`; returns the HTML path.
pub fn write_report(output_dir: &Path, diagnosis: &Diagnosis, chart_features: usize) -> PredictorResult<PathBuf> {
    create_dir_all(output_dir).map_err(|e| {
        error!("Failed to create output directory {}: {}", output_dir.display(), e);
        e
    })?;

    let chart_features = chart_features.max(1);
    draw_probability_chart(&output_dir.join(PROBABILITY_CHART), &diagnosis.prediction)?;
    draw_importance_chart(&output_dir.join(IMPORTANCE_CHART), &diagnosis.attribution, chart_features)?;
    draw_signed_chart(&output_dir.join(SIGNED_CHART), &diagnosis.attribution, chart_features)?;
    draw_force_chart(
        &output_dir.join(FORCE_CHART),
        &diagnosis.attribution,
        &diagnosis.features,
        chart_features,
    )?;

    let mut frame = attributions_frame(diagnosis)?;
    write_csv(&mut frame, &output_dir.join(ATTRIBUTIONS_CSV))?;
    write_json_pretty(diagnosis, &output_dir.join(DIAGNOSIS_JSON))?;

    let html_path = output_dir.join(REPORT_HTML);
    std::fs::write(&html_path, render_html(diagnosis))?;
    info!("Report written to {}", html_path.display());
    Ok(html_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_encoding::tests::sample_patient;
    use crate::helper_functions::{read_csv, read_json};
    use crate::models::PredictionRequest;
    use crate::pipeline::tests::stub_predictor;

    fn diagnosis() -> Diagnosis {
        stub_predictor(vec![0.7, 0.2, 0.1])
            .predict(&PredictionRequest {
                sequence: "A".repeat(300),
                patient: sample_patient(),
            })
            .unwrap()
    }

    #[test]
    fn html_carries_every_section() {
        let d = diagnosis();
        let html = render_html(&d);
        assert!(html.contains("Final Prediction: Cancer"));
        assert!(html.contains("<li>Cancer: 0.700</li>"));
        assert!(html.contains("The model predicts <strong>Cancer</strong> (70.0%)"));
        assert!(html.contains(&d.highlighted_sequence));
        assert!(html.contains(SIGNED_CHART));
        assert!(html.contains(FORCE_CHART));
    }

    #[test]
    fn report_writes_every_artefact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let d = diagnosis();

        let html_path = write_report(&out, &d, 10).unwrap();
        assert_eq!(html_path, out.join(REPORT_HTML));

        for file in [
            PROBABILITY_CHART,
            IMPORTANCE_CHART,
            SIGNED_CHART,
            FORCE_CHART,
            ATTRIBUTIONS_CSV,
            DIAGNOSIS_JSON,
            REPORT_HTML,
        ] {
            let path = out.join(file);
            assert!(path.exists(), "{file} missing");
            assert!(std::fs::metadata(&path).unwrap().len() > 0, "{file} empty");
        }

        let svg = std::fs::read_to_string(out.join(FORCE_CHART)).unwrap();
        assert!(svg.contains("<svg"));

        let table = read_csv(&out.join(ATTRIBUTIONS_CSV)).unwrap();
        assert_eq!(table.height(), 14);

        let json: serde_json::Value = read_json(&out.join(DIAGNOSIS_JSON)).unwrap();
        assert_eq!(json["prediction"]["predicted_class"], "Cancer");
        assert_eq!(json["flags"]["m1"], 1);
    }

    #[test]
    fn attribution_table_is_sorted_by_magnitude() {
        let frame = attributions_frame(&diagnosis()).unwrap();
        assert_eq!(frame.height(), 14);
        let features = frame.column("feature").unwrap().str().unwrap();
        assert_eq!(features.get(0), Some("Age"));
        assert_eq!(features.get(1), Some("BMI"));
        let values = frame.column("value").unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(45.0));
    }

    #[test]
    fn emphasis_pairs_markers() {
        assert_eq!(emphasis("a **b** c"), "a <strong>b</strong> c");
        assert_eq!(emphasis("plain"), "plain");
    }
}
