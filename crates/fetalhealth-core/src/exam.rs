//! Cardiotocography exam schema
//!
//! The service accepts exactly one feature schema. Field order is
//! load-bearing: it decides which field is reported first on a validation
//! failure and it is the column order of the feature vector handed to the
//! model.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use tracing::debug;

/// Number of measurements in one exam
pub const FEATURE_COUNT: usize = 21;

/// Required exam fields, in validation and feature order
pub const EXAM_FIELDS: [&str; FEATURE_COUNT] = [
    "baseline_value",
    "accelerations",
    "fetal_movement",
    "uterine_contractions",
    "light_decelerations",
    "severe_decelerations",
    "prolongued_decelerations",
    "abnormal_short_term_variability",
    "mean_value_of_short_term_variability",
    "percentage_of_time_with_abnormal_long_term_variability",
    "mean_value_of_long_term_variability",
    "histogram_width",
    "histogram_min",
    "histogram_max",
    "histogram_number_of_peaks",
    "histogram_number_of_zeroes",
    "histogram_mode",
    "histogram_mean",
    "histogram_median",
    "histogram_variance",
    "histogram_tendency",
];

/// One row of model input, ordered as [`EXAM_FIELDS`]
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Class label produced by the model for one exam
pub type PredictionResult = i64;

/// Labels the service may answer with: normal, suspect, pathological
pub const FETAL_HEALTH_CLASSES: RangeInclusive<PredictionResult> = 1..=3;

/// A validated exam: every field present and numeric
#[derive(Debug, Clone, PartialEq)]
pub struct ExamRecord {
    values: FeatureVector,
}

impl ExamRecord {
    /// Validate a decoded JSON payload.
    ///
    /// Fails fast on the first offending field in [`EXAM_FIELDS`] order.
    /// Fields outside the schema are ignored.
    pub fn from_json(payload: &Value) -> Result<Self> {
        if is_empty_payload(payload) {
            return Err(Error::EmptyPayload);
        }

        let empty = Map::new();
        let fields = payload.as_object().unwrap_or(&empty);

        let mut values = [0.0; FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(EXAM_FIELDS) {
            let raw = match fields.get(name) {
                None | Some(Value::Null) => return Err(Error::MissingField(name)),
                Some(raw) => raw,
            };
            *slot = coerce_number(raw).ok_or(Error::InvalidField(name))?;
        }

        debug!("Validated exam record with {} fields", FEATURE_COUNT);
        Ok(Self { values })
    }

    /// Ordered feature vector
    pub fn features(&self) -> &FeatureVector {
        &self.values
    }

    /// Look up one measurement by field name
    pub fn get(&self, field: &str) -> Option<f64> {
        EXAM_FIELDS
            .iter()
            .position(|name| *name == field)
            .map(|idx| self.values[idx])
    }
}

/// Whether a payload carries no data at all.
///
/// `null`, `false`, `0`, `""`, `[]` and `{}` count as empty.
pub fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Reject a model label outside [`FETAL_HEALTH_CLASSES`]
pub fn check_class(label: PredictionResult) -> Result<PredictionResult> {
    if FETAL_HEALTH_CLASSES.contains(&label) {
        Ok(label)
    } else {
        Err(Error::UnexpectedLabel(label))
    }
}

/// Coerce a JSON value into a float.
///
/// Numbers pass through, booleans map to 1.0/0.0 and strings are parsed
/// after trimming whitespace. Arrays and objects never coerce.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
