//! Lifecycle of the single served model

use crate::linear::SafeTensorsLoader;
use crate::predictor::{ArtifactLoader, Predictor};
use fetalhealth_core::{Error, FeatureVector, PredictionResult, Result};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Counter of artifact load attempts, labelled by `result`
pub const MODEL_LOADS_TOTAL: &str = "fetalhealth_model_loads_total";

/// Owns the one classifier instance and runs inference over it.
///
/// The model starts absent, is loaded from a fixed artifact path, may be
/// reset by [`unload`](Self::unload) and is reloaded lazily through
/// [`ensure_loaded`](Self::ensure_loaded).
pub struct ModelHolder {
    /// Fixed artifact location
    artifact_path: PathBuf,

    /// Deserializer for the artifact format
    loader: Arc<dyn ArtifactLoader>,

    /// Currently held model
    model: RwLock<Option<Arc<dyn Predictor>>>,

    /// Serializes loads so racing requests deserialize once
    load_lock: Mutex<()>,
}

impl ModelHolder {
    /// Create an empty holder for the given artifact path and loader
    pub fn new(artifact_path: impl Into<PathBuf>, loader: Arc<dyn ArtifactLoader>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            loader,
            model: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Create an empty holder reading safetensors artifacts
    pub fn with_safetensors(artifact_path: impl Into<PathBuf>) -> Self {
        Self::new(artifact_path, Arc::new(SafeTensorsLoader::new()))
    }

    /// Load the artifact, replacing whatever model was held.
    ///
    /// Returns `false` when the artifact is missing or cannot be
    /// deserialized; the held model is absent afterwards.
    pub fn load_model(&self) -> bool {
        let _guard = self.load_lock.lock();
        self.load_locked()
    }

    /// Make sure a model is held, loading it if absent
    pub fn ensure_loaded(&self) -> bool {
        if self.has_model() {
            return true;
        }

        let _guard = self.load_lock.lock();
        // Another request may have finished loading while we waited
        if self.has_model() {
            debug!("Model loaded by a concurrent request");
            return true;
        }
        self.load_locked()
    }

    fn load_locked(&self) -> bool {
        let start = Instant::now();
        match self.read_artifact() {
            Ok(model) => {
                info!(
                    "Loaded model '{}' from {} in {}ms",
                    model.name(),
                    self.artifact_path.display(),
                    start.elapsed().as_millis()
                );
                *self.model.write() = Some(model);
                metrics::counter!(MODEL_LOADS_TOTAL, "result" => "ok").increment(1);
                true
            }
            Err(e) => {
                warn!("Failed to load model: {}", e);
                *self.model.write() = None;
                let result = match e {
                    Error::ArtifactMissing(_) => "missing",
                    _ => "corrupt",
                };
                metrics::counter!(MODEL_LOADS_TOTAL, "result" => result).increment(1);
                false
            }
        }
    }

    fn read_artifact(&self) -> Result<Arc<dyn Predictor>> {
        if !self.artifact_path.exists() {
            return Err(Error::ArtifactMissing(self.artifact_path.clone()));
        }
        self.loader.load(&self.artifact_path)
    }

    /// Predict the class of one exam.
    ///
    /// Fails with [`Error::ModelNotLoaded`] when no model is held. Errors
    /// from the predictor propagate unchanged.
    pub fn inference(&self, features: &FeatureVector) -> Result<PredictionResult> {
        let model = self.model().ok_or(Error::ModelNotLoaded)?;

        let labels = model.predict(std::slice::from_ref(features))?;
        labels
            .first()
            .copied()
            .ok_or_else(|| Error::prediction(format!("model '{}' returned no labels", model.name())))
    }

    /// Check if a model is held
    pub fn has_model(&self) -> bool {
        self.model.read().is_some()
    }

    /// Get the held model
    pub fn model(&self) -> Option<Arc<dyn Predictor>> {
        self.model.read().clone()
    }

    /// Install an already built model
    pub fn set_model(&self, model: Arc<dyn Predictor>) {
        *self.model.write() = Some(model);
    }

    /// Drop the held model; the next `ensure_loaded` reloads it
    pub fn unload(&self) {
        if self.model.write().take().is_some() {
            info!("Model unloaded");
        }
    }

    /// Get the artifact path
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}
