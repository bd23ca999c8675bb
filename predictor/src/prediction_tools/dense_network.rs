//! Feed-forward classifier evaluated from exported dense-layer weights.
//!
//! Weights are stored input-major (`weights[i][j]` connects input `i` to unit
//! `j`), the layout Keras `Dense` layers export.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, PredictorResult};
use crate::prediction_tools::Scorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

impl Activation {
    fn apply(self, z: Array1<f64>) -> Array1<f64> {
        match self {
            Activation::Linear => z,
            Activation::Relu => z.mapv_into(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv_into(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Softmax => softmax(z),
        }
    }
}

/// Numerically stable softmax.
pub fn softmax(z: Array1<f64>) -> Array1<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = z.mapv_into(|v| (v - max).exp());
    let total = exp.sum();
    exp / total
}

/// Serialized form of one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayerSpec {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
    pub activation: Activation,
}

/// Serialized form of the whole network (`model.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub layers: Vec<DenseLayerSpec>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f64>,
    biases: Array1<f64>,
    activation: Activation,
}

impl DenseLayer {
    fn forward(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let z = x.dot(&self.weights) + &self.biases;
        self.activation.apply(z)
    }
}

#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn from_spec(spec: NetworkSpec) -> PredictorResult<Self> {
        if spec.layers.is_empty() {
            return Err(PredictorError::artifact("model", "network has no layers"));
        }

        let mut layers = Vec::with_capacity(spec.layers.len());
        let mut previous_width: Option<usize> = None;

        for (idx, layer) in spec.layers.into_iter().enumerate() {
            let dim_in = layer.weights.len();
            let dim_out = layer.biases.len();

            if let Some(row) = layer.weights.iter().find(|row| row.len() != dim_out) {
                return Err(PredictorError::artifact(
                    "model",
                    format!("layer {idx}: weight row of {} for {dim_out} units", row.len()),
                ));
            }
            if let Some(prev) = previous_width {
                if prev != dim_in {
                    return Err(PredictorError::artifact(
                        "model",
                        format!("layer {idx} expects {dim_in} inputs but previous layer yields {prev}"),
                    ));
                }
            }

            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((dim_in, dim_out), flat)
                .map_err(|e| PredictorError::artifact("model", format!("layer {idx}: {e}")))?;

            layers.push(DenseLayer {
                weights,
                biases: Array1::from(layer.biases),
                activation: layer.activation,
            });
            previous_width = Some(dim_out);
        }

        Ok(Self { layers })
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    pub fn output_width(&self) -> usize {
        self.layers[self.layers.len() - 1].biases.len()
    }

    pub fn forward(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut out = self.layers[0].forward(x);
        for layer in &self.layers[1..] {
            out = layer.forward(out.view());
        }
        out
    }
}

impl Scorer for DenseNetwork {
    fn score(&self, features: ArrayView1<f64>) -> PredictorResult<Array1<f64>> {
        if features.len() != self.input_width() {
            return Err(PredictorError::Schema(format!(
                "model expects {} features, got {}",
                self.input_width(),
                features.len()
            )));
        }
        let out = self.forward(features);
        match self.layers[self.layers.len() - 1].activation {
            Activation::Softmax => Ok(out),
            _ => Ok(softmax(out)),
        }
    }
}
