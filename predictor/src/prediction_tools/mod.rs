//! Scoring and explanation capabilities.
//!
//! The pipeline only talks to the classifier and the explainer through these
//! two traits, so tests can swap in deterministic stand-ins.

use ndarray::{Array1, ArrayView1};

use crate::error::PredictorResult;

pub mod dense_network;
pub mod shapley;

/// A classifier mapping a scaled feature vector to class probabilities.
pub trait Scorer {
    fn score(&self, features: ArrayView1<f64>) -> PredictorResult<Array1<f64>>;
}

/// Per-feature contributions toward one class.
#[derive(Debug, Clone, PartialEq)]
pub struct Contributions {
    pub values: Array1<f64>,
    /// Output for the explained class on the reference input.
    pub baseline: f64,
}

pub trait Attributor {
    fn attribute(&self, features: ArrayView1<f64>, class_index: usize) -> PredictorResult<Contributions>;
}
