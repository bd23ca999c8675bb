use std::cmp::Ordering;

use crate::feature_encoding::FeatureVector;
use crate::models::{AttributionResult, Mutation, PredictionResult};

/// Number of reasons quoted in the plain-language summary.
pub const SUMMARY_REASONS: usize = 3;

/// Features ranked by |attribution|, largest first.
///
/// Equal magnitudes keep the canonical column order, so the ranking does not
/// depend on the order the attributions arrive in. Features missing from
/// `column_order` rank after all known ones, by name.
pub fn rank_features<'a>(
    attributions: impl IntoIterator<Item = (&'a str, f64)>,
    column_order: &[String],
) -> Vec<(&'a str, f64)> {
    let position = |name: &str| {
        column_order
            .iter()
            .position(|c| c == name)
            .unwrap_or(usize::MAX)
    };

    let mut ranked: Vec<(usize, &'a str, f64)> = attributions
        .into_iter()
        .map(|(name, value)| (position(name), name, value))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    ranked.sort_by(|a, b| {
        b.2.abs()
            .partial_cmp(&a.2.abs())
            .unwrap_or(Ordering::Equal)
    });

    ranked.into_iter().map(|(_, name, value)| (name, value)).collect()
}

fn describe(feature: &str, value: f64) -> String {
    if Mutation::from_name(feature).is_some() {
        if value > 0.0 {
            format!("presence of {feature}")
        } else {
            format!("absence of {feature}")
        }
    } else {
        format!("{feature}={value}")
    }
}

/// One-sentence explanation of a prediction.
pub fn summarize(
    prediction: &PredictionResult,
    attribution: &AttributionResult,
    features: &FeatureVector,
    reasons: usize,
) -> String {
    let ranked = rank_features(attribution.iter(), features.columns());
    let contributors: Vec<String> = ranked
        .iter()
        .take(reasons)
        .map(|(name, _)| describe(name, features.value(name).unwrap_or(0.0)))
        .collect();

    format!(
        "The model predicts **{}** ({:.1}%). Top contributors: {}.",
        prediction.predicted_class,
        prediction.predicted_probability() * 100.0,
        contributors.join(", ")
    )
}
