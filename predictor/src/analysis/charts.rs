//! SVG charts for the report: class probabilities and feature attributions.

use std::cmp::Ordering;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::error::{chart_err, PredictorResult};
use crate::feature_encoding::FeatureVector;
use crate::models::{AttributionResult, PredictionResult};

// ---------- helper fonts ----------
const CAPTION_FONT: (&str, i32) = ("sans-serif", 22);
const LABEL_FONT: (&str, i32) = ("sans-serif", 14);

const BAR_COLOUR: RGBColor = RGBColor(70, 130, 180); // steelblue
const POSITIVE_COLOUR: RGBColor = RGBColor(0, 0, 255);
const NEGATIVE_COLOUR: RGBColor = RGBColor(255, 0, 0);

/// The `n` features with the largest |value|, largest first.
pub fn top_by_magnitude(attribution: &AttributionResult, n: usize) -> Vec<(String, f64)> {
    let mut pairs: Vec<(String, f64)> = attribution
        .iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    pairs.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(Ordering::Equal));
    pairs.truncate(n);
    pairs
}

/// Half-width of a zero-centred axis holding every value, with 10% padding.
pub fn symmetric_limit(values: &[f64]) -> f64 {
    let max = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if max == 0.0 {
        1.0
    } else {
        max * 1.1
    }
}

/// One step of the force chart: the output moves from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSegment {
    pub label: String,
    pub start: f64,
    pub end: f64,
}

/// Waterfall from the baseline to the explained output.
///
/// The `top_n` strongest features get their own step, labelled with the
/// unscaled value; the remainder is folded into a single step so the last
/// `end` is always `baseline + Σ attribution`.
pub fn force_segments(attribution: &AttributionResult, features: &FeatureVector, top_n: usize) -> Vec<ForceSegment> {
    let top = top_by_magnitude(attribution, top_n);
    let mut segments = Vec::with_capacity(top.len() + 1);
    let mut position = attribution.baseline;

    for (name, value) in &top {
        let label = match features.value(name) {
            Some(v) => format!("{name} = {v}"),
            None => name.clone(),
        };
        segments.push(ForceSegment {
            label,
            start: position,
            end: position + value,
        });
        position += value;
    }

    let rest = attribution.features.len() - top.len();
    if rest > 0 {
        let shown: f64 = top.iter().map(|(_, v)| v).sum();
        let remainder = attribution.values.iter().sum::<f64>() - shown;
        segments.push(ForceSegment {
            label: format!("{rest} other features"),
            start: position,
            end: position + remainder,
        });
    }
    segments
}

fn label_for(labels: &[String], value: &SegmentValue<u32>) -> String {
    match value {
        SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Vertical bars, one per class.
pub fn draw_probability_chart(path: &Path, prediction: &PredictionResult) -> PredictorResult<()> {
    let n = prediction.classes.len() as u32;

    let root = SVGBackend::new(path, (760, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Prediction Probabilities", CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..n).into_segmented(), 0.0f64..1.0f64)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Probability")
        .x_labels(n as usize)
        .x_label_formatter(&|v| label_for(&prediction.classes, v))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(BAR_COLOUR.filled())
                .margin(12)
                .data(
                    prediction
                        .probabilities
                        .iter()
                        .enumerate()
                        .map(|(i, p)| (i as u32, *p)),
                ),
        )
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!("Probability chart saved to {}", path.display());
    Ok(())
}

/// Horizontal bars of |attribution| for the strongest `top_n` features.
pub fn draw_importance_chart(path: &Path, attribution: &AttributionResult, top_n: usize) -> PredictorResult<()> {
    let top = top_by_magnitude(attribution, top_n);
    let labels: Vec<String> = top.iter().map(|(name, _)| name.clone()).collect();
    let n = top.len() as u32;
    let x_max = symmetric_limit(&top.iter().map(|(_, v)| *v).collect::<Vec<_>>());

    let root = SVGBackend::new(path, (760, 420)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Top Feature Contributions", CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(130)
        .build_cartesian_2d(0.0f64..x_max, (0u32..n).into_segmented())
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("|attribution| (impact on prediction)")
        .y_labels(n as usize)
        .y_label_formatter(&|v| label_for(&labels, v))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            Histogram::horizontal(&chart)
                .style(BAR_COLOUR.filled())
                .margin(6)
                .data(top.iter().enumerate().map(|(i, (_, v))| (i as u32, v.abs()))),
        )
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!("Importance chart saved to {}", path.display());
    Ok(())
}

/// Signed attributions on an axis centred at zero: positive blue, negative red.
pub fn draw_signed_chart(path: &Path, attribution: &AttributionResult, top_n: usize) -> PredictorResult<()> {
    let top = top_by_magnitude(attribution, top_n);
    let labels: Vec<String> = top.iter().map(|(name, _)| name.clone()).collect();
    let n = top.len() as u32;
    let limit = symmetric_limit(&top.iter().map(|(_, v)| *v).collect::<Vec<_>>());

    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Impact on Prediction (Positive / Negative)", CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(130)
        .build_cartesian_2d(-limit..limit, (0u32..n).into_segmented())
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Attribution (effect on prediction)")
        .y_desc("Feature")
        .y_labels(n as usize)
        .y_label_formatter(&|v| label_for(&labels, v))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            Histogram::horizontal(&chart)
                .style_func(|_, value: &f64| {
                    if *value > 0.0 {
                        POSITIVE_COLOUR.filled()
                    } else {
                        NEGATIVE_COLOUR.filled()
                    }
                })
                .margin(6)
                .data(top.iter().enumerate().map(|(i, (_, v))| (i as u32, *v))),
        )
        .map_err(chart_err)?;

    // zero line
    chart
        .draw_series(LineSeries::new(
            vec![(0.0, SegmentValue::Exact(0)), (0.0, SegmentValue::Last)],
            BLACK.stroke_width(1),
        ))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!("Signed attribution chart saved to {}", path.display());
    Ok(())
}

/// Force chart: each feature pushes the predicted-class output up (blue) or
/// down (red), starting at the baseline.
pub fn draw_force_chart(
    path: &Path,
    attribution: &AttributionResult,
    features: &FeatureVector,
    top_n: usize,
) -> PredictorResult<()> {
    let segments = force_segments(attribution, features, top_n);
    let labels: Vec<String> = segments.iter().map(|s| s.label.clone()).collect();
    let n = segments.len() as u32;
    let output = segments.last().map_or(attribution.baseline, |s| s.end);

    let (lo, hi) = segments
        .iter()
        .flat_map(|s| [s.start, s.end])
        .fold((attribution.baseline, attribution.baseline), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = if hi > lo { (hi - lo) * 0.1 } else { 0.5 };

    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Impact on Prediction (Force Plot)", CAPTION_FONT)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(170)
        .build_cartesian_2d((lo - pad)..(hi + pad), (0u32..n).into_segmented())
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc(format!("Model output (baseline {:.3} → {:.3})", attribution.baseline, output))
        .y_labels(n as usize)
        .y_label_formatter(&|v| label_for(&labels, v))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(segments.iter().enumerate().map(|(i, s)| {
            let colour = if s.end >= s.start { POSITIVE_COLOUR } else { NEGATIVE_COLOUR };
            let row = i as u32;
            Rectangle::new(
                [(s.start, SegmentValue::Exact(row)), (s.end, SegmentValue::Exact(row + 1))],
                colour.mix(0.8).filled(),
            )
        }))
        .map_err(chart_err)?;

    // baseline and final output
    for x in [attribution.baseline, output] {
        chart
            .draw_series(LineSeries::new(
                vec![(x, SegmentValue::Exact(0)), (x, SegmentValue::Last)],
                BLACK.stroke_width(1),
            ))
            .map_err(chart_err)?;
    }

    root.present().map_err(chart_err)?;
    info!("Force chart saved to {}", path.display());
    Ok(())
}
