//! shapley.rs – Shapley-value attribution against a fixed background input
//!
//! A feature "absent" from a coalition takes its background value. Small
//! inputs are explained exactly by enumerating every coalition; wider inputs
//! fall back to averaging marginal contributions over seeded random
//! permutations. Both satisfy `Σ φᵢ = f(x) − f(background)`.

use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PredictorError, PredictorResult};
use crate::prediction_tools::{Attributor, Contributions, Scorer};

/// Hard cap on exact enumeration; coalition masks are `usize` bit sets.
pub const MAX_EXACT_FEATURES: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapleySettings {
    /// Up to this many features every coalition is evaluated (2ⁿ model calls).
    /// Values above [`MAX_EXACT_FEATURES`] are clamped.
    pub exact_feature_limit: usize,
    pub permutations: usize,
    pub seed: u64,
}

impl Default for ShapleySettings {
    fn default() -> Self {
        Self {
            exact_feature_limit: 16,
            permutations: 256,
            seed: 42,
        }
    }
}

pub struct ShapleyAttributor {
    model: Arc<dyn Scorer + Send + Sync>,
    background: Array1<f64>,
    settings: ShapleySettings,
}

impl ShapleyAttributor {
    pub fn new(
        model: Arc<dyn Scorer + Send + Sync>,
        background: Array1<f64>,
        settings: ShapleySettings,
    ) -> Self {
        Self {
            model,
            background,
            settings,
        }
    }

    fn output(&self, input: ArrayView1<f64>, class_index: usize) -> PredictorResult<f64> {
        let out = self.model.score(input)?;
        out.get(class_index).copied().ok_or_else(|| {
            PredictorError::Schema(format!(
                "class index {class_index} out of range for {} outputs",
                out.len()
            ))
        })
    }

    /// Background with the features selected by `mask` taken from `x`.
    fn coalition(&self, x: ArrayView1<f64>, mask: usize) -> Array1<f64> {
        let mut input = self.background.clone();
        for i in 0..x.len() {
            if mask & (1 << i) != 0 {
                input[i] = x[i];
            }
        }
        input
    }

    fn exact(&self, x: ArrayView1<f64>, class_index: usize) -> PredictorResult<Array1<f64>> {
        let n = x.len();
        let mut values = Vec::with_capacity(1 << n);
        for mask in 0..(1usize << n) {
            values.push(self.output(self.coalition(x, mask).view(), class_index)?);
        }

        // weight(|S|) = |S|! (n - |S| - 1)! / n!
        let weights: Vec<f64> = (0..n)
            .map(|s| factorial(s) * factorial(n - s - 1) / factorial(n))
            .collect();

        let mut phi = Array1::<f64>::zeros(n);
        for mask in 0..(1usize << n) {
            let size = mask.count_ones() as usize;
            for i in 0..n {
                if mask & (1 << i) == 0 {
                    phi[i] += weights[size] * (values[mask | (1 << i)] - values[mask]);
                }
            }
        }
        Ok(phi)
    }

    fn sampled(&self, x: ArrayView1<f64>, class_index: usize) -> PredictorResult<Array1<f64>> {
        let n = x.len();
        let rounds = self.settings.permutations.max(1);
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut phi = Array1::<f64>::zeros(n);

        for _ in 0..rounds {
            order.shuffle(&mut rng);
            let mut input = self.background.clone();
            let mut previous = self.output(input.view(), class_index)?;
            for &i in &order {
                input[i] = x[i];
                let current = self.output(input.view(), class_index)?;
                phi[i] += current - previous;
                previous = current;
            }
        }
        Ok(phi / rounds as f64)
    }
}

fn factorial(k: usize) -> f64 {
    (1..=k).map(|v| v as f64).product()
}

impl Attributor for ShapleyAttributor {
    fn attribute(&self, features: ArrayView1<f64>, class_index: usize) -> PredictorResult<Contributions> {
        if features.len() != self.background.len() {
            return Err(PredictorError::Schema(format!(
                "background has {} features, input has {}",
                self.background.len(),
                features.len()
            )));
        }

        let baseline = self.output(self.background.view(), class_index)?;
        let n = features.len();
        let exact_limit = self.settings.exact_feature_limit.min(MAX_EXACT_FEATURES);
        let values = if n <= exact_limit {
            debug!("Exact Shapley values over {} features ({} coalitions)", n, 1usize << n);
            self.exact(features, class_index)?
        } else {
            debug!(
                "Sampled Shapley values over {} features ({} permutations)",
                n, self.settings.permutations
            );
            self.sampled(features, class_index)?
        };

        Ok(Contributions { values, baseline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Class 0 is linear in the inputs, class 1 is the product x0·x1.
    struct Polynomial {
        weights: Vec<f64>,
    }

    impl Scorer for Polynomial {
        fn score(&self, x: ArrayView1<f64>) -> PredictorResult<Array1<f64>> {
            let linear: f64 = x.iter().zip(&self.weights).map(|(a, w)| a * w).sum();
            Ok(Array1::from(vec![linear, x[0] * x[1]]))
        }
    }

    fn attributor(width: usize, settings: ShapleySettings) -> ShapleyAttributor {
        let model = Arc::new(Polynomial {
            weights: (1..=width).map(|w| w as f64).collect(),
        });
        ShapleyAttributor::new(model, Array1::zeros(width), settings)
    }

    #[test]
    fn exact_values_of_linear_model_are_weighted_inputs() {
        let attr = attributor(4, ShapleySettings::default());
        let x = Array1::from(vec![1.0, -2.0, 0.5, 3.0]);
        let c = attr.attribute(x.view(), 0).unwrap();
        let expected = [1.0, -4.0, 1.5, 12.0];
        for (got, want) in c.values.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
        assert_eq!(c.baseline, 0.0);
    }

    #[test]
    fn interaction_is_split_evenly() {
        let attr = attributor(3, ShapleySettings::default());
        let x = Array1::from(vec![2.0, 3.0, 7.0]);
        let c = attr.attribute(x.view(), 1).unwrap();
        assert!((c.values[0] - 3.0).abs() < 1e-9);
        assert!((c.values[1] - 3.0).abs() < 1e-9);
        assert!(c.values[2].abs() < 1e-9);
    }

    #[test]
    fn sampled_values_keep_efficiency() {
        let settings = ShapleySettings {
            exact_feature_limit: 0,
            permutations: 50,
            seed: 7,
        };
        let attr = attributor(5, settings);
        let x = Array1::from(vec![1.0, 2.0, -1.0, 0.0, 4.0]);

        let c = attr.attribute(x.view(), 1).unwrap();
        assert!((c.values.sum() - 2.0).abs() < 1e-9);

        // linear models have no interactions, so every permutation agrees
        let c = attr.attribute(x.view(), 0).unwrap();
        assert!((c.values[4] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn sampling_is_reproducible() {
        let settings = ShapleySettings {
            exact_feature_limit: 0,
            permutations: 10,
            seed: 3,
        };
        let attr = attributor(3, settings);
        let x = Array1::from(vec![1.5, -0.5, 2.0]);
        let a = attr.attribute(x.view(), 1).unwrap();
        let b = attr.attribute(x.view(), 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_exact_limit_falls_back_to_sampling() {
        let settings = ShapleySettings {
            exact_feature_limit: usize::MAX,
            permutations: 4,
            seed: 1,
        };
        let width = 70;
        let attr = attributor(width, settings);
        let x = Array1::from(vec![1.0; width]);
        let c = attr.attribute(x.view(), 0).unwrap();
        // linear class: every permutation yields w_i * x_i
        assert!((c.values[69] - 70.0).abs() < 1e-9);
        let total: f64 = (1..=width).map(|w| w as f64).sum();
        assert!((c.values.sum() - total).abs() < 1e-6);
    }

    #[test]
    fn rejects_width_mismatch_and_bad_class() {
        let attr = attributor(3, ShapleySettings::default());
        assert!(attr.attribute(Array1::from(vec![1.0]).view(), 0).is_err());
        assert!(attr.attribute(Array1::from(vec![1.0, 1.0, 1.0]).view(), 5).is_err());
    }
}
