//! Fetal Health Core
//!
//! Types shared across the fetal health inference service:
//! - The fixed cardiotocography exam schema and its validation
//! - Error types and result handling

pub mod error;
pub mod exam;

pub use error::{Error, Result};
pub use exam::{
    check_class, is_empty_payload, ExamRecord, FeatureVector, PredictionResult, EXAM_FIELDS,
    FEATURE_COUNT, FETAL_HEALTH_CLASSES,
};
