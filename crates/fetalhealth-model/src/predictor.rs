//! Predictor capability and artifact loading traits

use fetalhealth_core::{FeatureVector, PredictionResult, Result};
use std::path::Path;
use std::sync::Arc;

/// A trained classifier: ordered feature rows in, one class label per row out
pub trait Predictor: Send + Sync {
    /// Predict a label for every row
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<PredictionResult>>;

    /// Get the predictor name
    fn name(&self) -> &str;
}

/// Deserializes an on-disk artifact into a predictor
pub trait ArtifactLoader: Send + Sync {
    /// Load the artifact at `path`.
    ///
    /// Callers have already checked that the path exists.
    fn load(&self, path: &Path) -> Result<Arc<dyn Predictor>>;
}
