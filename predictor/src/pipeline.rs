//! pipeline.rs – sequence + patient → diagnosis with explanations
//!
//! validate → detect → encode → score → attribute → summarize / highlight

use std::sync::Arc;

use ndarray::Array1;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::highlight::{highlight, Palette};
use crate::analysis::summary::{summarize, SUMMARY_REASONS};
use crate::config::PredictorConfig;
use crate::data_handling::artifacts::ArtifactBundle;
use crate::error::{PredictorError, PredictorResult};
use crate::feature_encoding::{FeatureEncoder, FeatureVector};
use crate::models::{AttributionResult, MutationFlags, PredictionRequest, PredictionResult};
use crate::mutation_detection::detect;
use crate::prediction_tools::shapley::ShapleyAttributor;
use crate::prediction_tools::{Attributor, Scorer};

/// Allowed drift of Σ probabilities from 1.
const PROBABILITY_TOLERANCE: f64 = 1e-3;

/// Everything produced for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub flags: MutationFlags,
    pub features: FeatureVector,
    pub prediction: PredictionResult,
    pub attribution: AttributionResult,
    pub summary: String,
    pub highlighted_sequence: String,
}

/// Index of the largest value; the first one wins ties, NaN never wins.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Loaded artifacts plus the scoring/explaining capabilities.
///
/// Immutable after construction; every request goes through `&self`.
pub struct Predictor {
    encoder: FeatureEncoder,
    classes: Vec<String>,
    scorer: Arc<dyn Scorer + Send + Sync>,
    attributor: Box<dyn Attributor + Send + Sync>,
    reasons: usize,
    palette: Palette,
}

impl Predictor {
    pub fn new(
        encoder: FeatureEncoder,
        classes: Vec<String>,
        scorer: Arc<dyn Scorer + Send + Sync>,
        attributor: Box<dyn Attributor + Send + Sync>,
    ) -> PredictorResult<Self> {
        if classes.is_empty() {
            return Err(PredictorError::artifact("label_encoder", "no classes"));
        }
        Ok(Self {
            encoder,
            classes,
            scorer,
            attributor,
            reasons: SUMMARY_REASONS,
            palette: Palette::default(),
        })
    }

    /// Dense network scorer with Shapley attributions against the all-zero
    /// scaled input (the training mean for standard-scaled features).
    pub fn from_artifacts(bundle: ArtifactBundle, config: &PredictorConfig) -> PredictorResult<Self> {
        bundle.validate()?;
        let width = bundle.columns.len();
        let encoder = FeatureEncoder::new(bundle.columns, bundle.scaler)?;
        let network: Arc<dyn Scorer + Send + Sync> = Arc::new(bundle.network);
        let attributor = ShapleyAttributor::new(
            Arc::clone(&network),
            Array1::zeros(width),
            config.attribution.clone(),
        );

        Ok(Self::new(encoder, bundle.classes, network, Box::new(attributor))?
            .with_reasons(config.top_contributors)
            .with_palette(config.palette))
    }

    pub fn with_reasons(mut self, reasons: usize) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn prediction(&self, raw: &Array1<f64>) -> PredictorResult<PredictionResult> {
        if raw.len() != self.classes.len() {
            return Err(PredictorError::artifact(
                "model",
                format!("{} probabilities for {} classes", raw.len(), self.classes.len()),
            ));
        }
        let total = raw.sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            warn!("Class probabilities sum to {:.6}", total);
        }

        let raw = raw.to_vec();
        let predicted_index = argmax(&raw)
            .ok_or_else(|| PredictorError::Schema("model returned no usable probability".into()))?;

        Ok(PredictionResult {
            classes: self.classes.clone(),
            probabilities: raw.iter().map(|p| round_to(*p, 3)).collect(),
            predicted_index,
            predicted_class: self.classes[predicted_index].clone(),
        })
    }

    pub fn predict(&self, request: &PredictionRequest) -> PredictorResult<Diagnosis> {
        // detect() rejects short sequences before anything is scored
        let flags = detect(&request.sequence)?;
        let features = self.encoder.encode(&flags, &request.patient)?;
        debug!("Encoded features: {:?}", features.encoded());

        let raw = self.scorer.score(features.scaled())?;
        let prediction = self.prediction(&raw)?;

        let contributions = self
            .attributor
            .attribute(features.scaled(), prediction.predicted_index)?;
        let attribution = AttributionResult::new(
            features.columns().to_vec(),
            contributions.values.to_vec(),
            contributions.baseline,
        )?;

        let summary = summarize(&prediction, &attribution, &features, self.reasons);
        let highlighted_sequence = highlight(&request.sequence, &flags, self.palette)?;

        info!(
            "Predicted {} ({:.1}%) with {} marker(s)",
            prediction.predicted_class,
            prediction.predicted_probability() * 100.0,
            flags.count()
        );

        Ok(Diagnosis {
            flags,
            features,
            prediction,
            attribution,
            summary,
            highlighted_sequence,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::ArrayView1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::analysis::charts::force_segments;

    use crate::data_handling::artifacts::tests::write_bundle;
    use crate::feature_encoding::tests::{canonical_columns, identity_scaler, sample_patient};
    use crate::prediction_tools::Contributions;

    /// Fixed probabilities regardless of input.
    pub(crate) struct FixedScorer(pub Vec<f64>);

    impl Scorer for FixedScorer {
        fn score(&self, _features: ArrayView1<f64>) -> PredictorResult<Array1<f64>> {
            Ok(Array1::from(self.0.clone()))
        }
    }

    /// Attribution equal to the scaled input itself.
    pub(crate) struct EchoAttributor;

    impl Attributor for EchoAttributor {
        fn attribute(&self, features: ArrayView1<f64>, _class_index: usize) -> PredictorResult<Contributions> {
            Ok(Contributions {
                values: features.to_owned(),
                baseline: 0.25,
            })
        }
    }

    pub(crate) fn stub_predictor(probabilities: Vec<f64>) -> Predictor {
        let cols = canonical_columns();
        let encoder = FeatureEncoder::new(cols.clone(), identity_scaler(cols.len())).unwrap();
        let classes = vec!["Cancer".to_string(), "Diabetes".to_string(), "Healthy".to_string()];
        Predictor::new(
            encoder,
            classes,
            Arc::new(FixedScorer(probabilities)),
            Box::new(EchoAttributor),
        )
        .unwrap()
    }

    fn all_adenine_request() -> PredictionRequest {
        PredictionRequest {
            sequence: "A".repeat(300),
            patient: sample_patient(),
        }
    }

    #[test]
    fn end_to_end_with_stubs() {
        let predictor = stub_predictor(vec![0.1234, 0.6543, 0.2223]);
        let diagnosis = predictor.predict(&all_adenine_request()).unwrap();

        let bits: Vec<u8> = crate::models::Mutation::ALL
            .iter()
            .map(|m| diagnosis.flags.value(*m))
            .collect();
        assert_eq!(bits, vec![1, 1, 0, 0, 0]);

        assert_eq!(diagnosis.prediction.predicted_index, 1);
        assert_eq!(diagnosis.prediction.predicted_class, "Diabetes");
        assert_eq!(diagnosis.prediction.probabilities, vec![0.123, 0.654, 0.222]);

        // echo attribution: Age (45) > BMI (24.5) > Gender_Male / m1 / m2 (1.0)
        assert_eq!(
            diagnosis.summary,
            "The model predicts **Diabetes** (65.4%). Top contributors: Age=45, BMI=24.5, presence of m1."
        );
        assert_eq!(diagnosis.attribution.baseline, 0.25);
        assert!(diagnosis.highlighted_sequence.contains("<span"));
    }

    #[test]
    fn short_sequence_stops_before_scoring() {
        let predictor = stub_predictor(vec![0.2, 0.3, 0.5]);
        let mut request = all_adenine_request();
        request.sequence.truncate(120);
        assert!(matches!(
            predictor.predict(&request),
            Err(PredictorError::Validation(_))
        ));
    }

    /// Uniform probabilities, counting how often it is asked.
    struct CountingScorer(AtomicUsize);

    impl Scorer for CountingScorer {
        fn score(&self, _features: ArrayView1<f64>) -> PredictorResult<Array1<f64>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Array1::from(vec![0.5, 0.25, 0.25]))
        }
    }

    #[test]
    fn short_sequence_never_reaches_the_scorer() {
        let cols = canonical_columns();
        let encoder = FeatureEncoder::new(cols.clone(), identity_scaler(cols.len())).unwrap();
        let scorer = Arc::new(CountingScorer(AtomicUsize::new(0)));
        let predictor = Predictor::new(
            encoder,
            vec!["Cancer".into(), "Diabetes".into(), "Healthy".into()],
            scorer.clone(),
            Box::new(EchoAttributor),
        )
        .unwrap();

        let mut request = all_adenine_request();
        request.sequence.truncate(299);
        assert!(matches!(
            predictor.predict(&request),
            Err(PredictorError::Validation(_))
        ));
        assert_eq!(scorer.0.load(Ordering::SeqCst), 0);

        predictor.predict(&all_adenine_request()).unwrap();
        assert_eq!(scorer.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probability_count_must_match_classes() {
        let predictor = stub_predictor(vec![0.5, 0.5]);
        assert!(matches!(
            predictor.predict(&all_adenine_request()),
            Err(PredictorError::Artifact { .. })
        ));
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(round_to(0.87349, 3), 0.873);
    }

    #[test]
    fn real_artifacts_produce_a_distribution() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        let bundle = ArtifactBundle::load(dir.path()).unwrap();
        let predictor = Predictor::from_artifacts(bundle, &PredictorConfig::default()).unwrap();

        let diagnosis = predictor.predict(&all_adenine_request()).unwrap();
        let total: f64 = diagnosis.prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 5e-3);

        let best = argmax(&diagnosis.prediction.probabilities).unwrap();
        let p = &diagnosis.prediction;
        assert!(p.probabilities[p.predicted_index] >= p.probabilities[best]);

        // Shapley efficiency on the predicted class
        let explained: f64 = diagnosis.attribution.values.iter().sum();
        let predicted = predictor
            .scorer
            .score(diagnosis.features.scaled())
            .unwrap()[p.predicted_index];
        assert!((diagnosis.attribution.baseline + explained - predicted).abs() < 1e-9);

        // the force chart walks from the baseline to that same output
        let segments = force_segments(&diagnosis.attribution, &diagnosis.features, 5);
        assert_eq!(segments[0].start, diagnosis.attribution.baseline);
        let end = segments.last().unwrap().end;
        assert!((end - predicted).abs() < 1e-9);
    }
}
