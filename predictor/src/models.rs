use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{PredictorError, PredictorResult};

/// The five marker mutations checked on every sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mutation {
    M1,
    M2,
    M3,
    M4,
    M5,
}

impl Mutation {
    pub const ALL: [Mutation; 5] = [
        Mutation::M1,
        Mutation::M2,
        Mutation::M3,
        Mutation::M4,
        Mutation::M5,
    ];

    /// Feature-column name used by the classifier.
    pub fn name(self) -> &'static str {
        match self {
            Mutation::M1 => "m1",
            Mutation::M2 => "m2",
            Mutation::M3 => "m3",
            Mutation::M4 => "m4",
            Mutation::M5 => "m5",
        }
    }

    pub fn from_name(name: &str) -> Option<Mutation> {
        Mutation::ALL.into_iter().find(|m| m.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One binary indicator per [`Mutation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MutationFlags([bool; 5]);

impl MutationFlags {
    pub fn set(&mut self, mutation: Mutation, present: bool) {
        self.0[mutation.index()] = present;
    }

    pub fn is_set(&self, mutation: Mutation) -> bool {
        self.0[mutation.index()]
    }

    /// 0/1 value as fed to the classifier.
    pub fn value(&self, mutation: Mutation) -> u8 {
        u8::from(self.is_set(mutation))
    }

    pub fn active(&self) -> impl Iterator<Item = Mutation> + '_ {
        Mutation::ALL.into_iter().filter(|m| self.is_set(*m))
    }

    pub fn count(&self) -> usize {
        self.active().count()
    }
}

impl Serialize for MutationFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Mutation::ALL.len()))?;
        for m in Mutation::ALL {
            map.serialize_entry(m.name(), &self.value(m))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// All categories in dummy-encoding order; the first one is the reference level.
    pub const CATEGORIES: [&'static str; 2] = ["Female", "Male"];

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(PredictorError::Schema(format!(
                "unknown gender '{other}', expected one of {:?}",
                Gender::CATEGORIES
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ethnicity {
    Caucasian,
    Asian,
    African,
    Other,
}

impl Ethnicity {
    /// All categories in dummy-encoding order; the first one is the reference level.
    pub const CATEGORIES: [&'static str; 4] = ["African", "Asian", "Caucasian", "Other"];

    pub fn label(self) -> &'static str {
        match self {
            Ethnicity::Caucasian => "Caucasian",
            Ethnicity::Asian => "Asian",
            Ethnicity::African => "African",
            Ethnicity::Other => "Other",
        }
    }
}

impl FromStr for Ethnicity {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "caucasian" => Ok(Ethnicity::Caucasian),
            "asian" => Ok(Ethnicity::Asian),
            "african" => Ok(Ethnicity::African),
            "other" => Ok(Ethnicity::Other),
            other => Err(PredictorError::Schema(format!(
                "unknown ethnicity '{other}', expected one of {:?}",
                Ethnicity::CATEGORIES
            ))),
        }
    }
}

/// Demographic and lifestyle fields; every field is required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    pub age: f64,
    pub gender: Gender,
    pub ethnicity: Ethnicity,
    pub smoker: bool,
    pub alcoholic: bool,
    pub bmi: f64,
    pub family_history: bool,
}

/// A raw DNA sequence plus the patient it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub sequence: String,
    pub patient: PatientRecord,
}

/// Class probabilities as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub classes: Vec<String>,
    /// Rounded to 3 decimals, aligned with `classes`.
    pub probabilities: Vec<f64>,
    pub predicted_index: usize,
    pub predicted_class: String,
}

impl PredictionResult {
    pub fn predicted_probability(&self) -> f64 {
        self.probabilities[self.predicted_index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.classes
            .iter()
            .map(String::as_str)
            .zip(self.probabilities.iter().copied())
    }
}

/// Signed per-feature contributions toward the predicted class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionResult {
    pub features: Vec<String>,
    pub values: Vec<f64>,
    /// Model output for the predicted class on the reference input.
    pub baseline: f64,
}

impl AttributionResult {
    pub fn new(features: Vec<String>, values: Vec<f64>, baseline: f64) -> PredictorResult<Self> {
        if features.len() != values.len() {
            return Err(PredictorError::Schema(format!(
                "{} attribution values for {} features",
                values.len(),
                features.len()
            )));
        }
        Ok(Self {
            features,
            values,
            baseline,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.features
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}
