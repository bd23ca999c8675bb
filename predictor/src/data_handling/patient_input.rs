//! Parsing of raw prediction requests.
//!
//! Forms deliver numbers as text and binary flags as 0/1, so every field
//! accepts either a JSON number or a string that parses as one. Nothing is
//! defaulted: a missing or malformed field is a schema error.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{PredictorError, PredictorResult};
use crate::helper_functions::read_json;
use crate::models::{Ethnicity, Gender, PatientRecord, PredictionRequest};

pub const SEQUENCE_FIELD: &str = "sequence";

/// Accepted spellings per field, canonical name first.
const AGE: &[&str] = &["age", "Age"];
const GENDER: &[&str] = &["gender", "Gender"];
const ETHNICITY: &[&str] = &["ethnicity", "Ethnicity", "Ethinicity"];
const SMOKER: &[&str] = &["smoker", "Smoker"];
const ALCOHOLIC: &[&str] = &["alcoholic", "Alcoholic"];
const BMI: &[&str] = &["bmi", "BMI"];
const FAMILY_HISTORY: &[&str] = &["family_history", "Family_history"];
const SEQUENCE: &[&str] = &[SEQUENCE_FIELD, "dna_sequence", "DNA_sequence"];

fn field<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> PredictorResult<&'a Value> {
    names
        .iter()
        .find_map(|n| fields.get(*n))
        .filter(|v| !v.is_null())
        .ok_or_else(|| PredictorError::Schema(format!("missing field '{}'", names[0])))
}

fn number(fields: &Map<String, Value>, names: &[&str]) -> PredictorResult<f64> {
    let value = field(fields, names)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(PredictorError::Schema(format!(
            "field '{}' must be numeric, got {value}",
            names[0]
        ))),
    }
}

fn binary(fields: &Map<String, Value>, names: &[&str]) -> PredictorResult<bool> {
    let value = field(fields, names)?;
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Some(false),
            Some(v) if v == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| {
        PredictorError::Schema(format!("field '{}' must be 0 or 1, got {value}", names[0]))
    })
}

fn text<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> PredictorResult<&'a str> {
    match field(fields, names)? {
        Value::String(s) => Ok(s.as_str()),
        other => Err(PredictorError::Schema(format!(
            "field '{}' must be text, got {other}",
            names[0]
        ))),
    }
}

pub fn parse_patient(fields: &Map<String, Value>) -> PredictorResult<PatientRecord> {
    Ok(PatientRecord {
        age: number(fields, AGE)?,
        gender: text(fields, GENDER)?.parse::<Gender>()?,
        ethnicity: text(fields, ETHNICITY)?.parse::<Ethnicity>()?,
        smoker: binary(fields, SMOKER)?,
        alcoholic: binary(fields, ALCOHOLIC)?,
        bmi: number(fields, BMI)?,
        family_history: binary(fields, FAMILY_HISTORY)?,
    })
}

/// A flat JSON object holding the sequence and the patient fields.
pub fn parse_request(value: &Value) -> PredictorResult<PredictionRequest> {
    let fields = value
        .as_object()
        .ok_or_else(|| PredictorError::Schema("request must be a JSON object".into()))?;
    Ok(PredictionRequest {
        sequence: text(fields, SEQUENCE)?.to_string(),
        patient: parse_patient(fields)?,
    })
}

pub fn read_request(path: &Path) -> PredictorResult<PredictionRequest> {
    let value: Value = read_json(path)?;
    parse_request(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_json() -> Value {
        json!({
            "sequence": "A".repeat(300),
            "age": "45",
            "gender": "Male",
            "ethnicity": "Caucasian",
            "smoker": 0,
            "alcoholic": "0",
            "bmi": 24.5,
            "family_history": false
        })
    }

    #[test]
    fn parses_form_style_request() {
        let req = parse_request(&request_json()).unwrap();
        assert_eq!(req.sequence.len(), 300);
        assert_eq!(
            req.patient,
            PatientRecord {
                age: 45.0,
                gender: Gender::Male,
                ethnicity: Ethnicity::Caucasian,
                smoker: false,
                alcoholic: false,
                bmi: 24.5,
                family_history: false,
            }
        );
    }

    #[test]
    fn accepts_training_column_names() {
        let value = json!({
            "DNA_sequence": "ACGT",
            "Age": 61, "Gender": "Female", "Ethinicity": "Asian",
            "Smoker": 1, "Alcoholic": 0, "BMI": "31.2", "Family_history": 1
        });
        let req = parse_request(&value).unwrap();
        assert_eq!(req.patient.ethnicity, Ethnicity::Asian);
        assert!(req.patient.smoker && req.patient.family_history);
        assert_eq!(req.patient.bmi, 31.2);
    }

    #[test]
    fn missing_field_is_schema_error() {
        let mut value = request_json();
        value.as_object_mut().unwrap().remove("bmi");
        match parse_request(&value) {
            Err(PredictorError::Schema(msg)) => assert!(msg.contains("bmi")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_fields_are_schema_errors() {
        for (key, bad) in [
            ("age", json!("forty")),
            ("bmi", json!(null)),
            ("smoker", json!(2)),
            ("gender", json!(1)),
            ("ethnicity", json!("Martian")),
        ] {
            let mut value = request_json();
            value[key] = bad;
            assert!(
                matches!(parse_request(&value), Err(PredictorError::Schema(_))),
                "{key} accepted"
            );
        }
    }

    #[test]
    fn request_must_be_object() {
        assert!(parse_request(&json!([1, 2])).is_err());
    }
}
