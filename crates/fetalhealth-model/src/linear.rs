//! Candle-backed linear classifier stored as a safetensors artifact
//!
//! Artifact layout:
//! - `linear.weight` `[n_classes, FEATURE_COUNT]` and `linear.bias` `[n_classes]`
//! - `classes` `[n_classes]`, the label emitted for each output row
//! - optional `scaler.mean` / `scaler.scale` `[FEATURE_COUNT]`, applied as
//!   `(x - mean) / scale` before the linear layer

use crate::predictor::{ArtifactLoader, Predictor};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use fetalhealth_core::{
    Error, FeatureVector, PredictionResult, Result, EXAM_FIELDS, FEATURE_COUNT,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const LINEAR_PREFIX: &str = "linear";
const CLASSES: &str = "classes";
const SCALER_MEAN: &str = "scaler.mean";
const SCALER_SCALE: &str = "scaler.scale";

fn corrupt(e: candle_core::Error) -> Error {
    Error::corrupt(e.to_string())
}

/// Feature standardization learned at training time
struct Scaler {
    mean: Tensor,
    scale: Tensor,
}

impl Scaler {
    fn new(mean: Tensor, scale: Tensor) -> Result<Self> {
        let mean = mean.to_dtype(DType::F32).map_err(corrupt)?;
        let scale = scale.to_dtype(DType::F32).map_err(corrupt)?;

        for (label, tensor) in [(SCALER_MEAN, &mean), (SCALER_SCALE, &scale)] {
            let len = tensor.dims1().map_err(corrupt)?;
            if len != FEATURE_COUNT {
                return Err(Error::corrupt(format!(
                    "'{}' has {} entries, expected {}",
                    label, len, FEATURE_COUNT
                )));
            }
        }

        let values = scale.to_vec1::<f32>().map_err(corrupt)?;
        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(Error::corrupt("'scaler.scale' must be finite and positive"));
        }

        Ok(Self { mean, scale })
    }

    fn apply(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        x.broadcast_sub(&self.mean)?.broadcast_div(&self.scale)
    }
}

/// Multi-class linear model evaluated on CPU
pub struct LinearClassifier {
    name: String,
    linear: Linear,
    scaler: Option<Scaler>,
    classes: Vec<PredictionResult>,
    device: Device,
}

impl LinearClassifier {
    /// Load a classifier from a safetensors file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::Cpu;

        let tensors = candle_core::safetensors::load(path, &device)
            .map_err(|e| Error::corrupt(format!("Failed to read safetensors: {}", e)))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Self::from_tensors(name, tensors, device)
    }

    /// Build a classifier from named tensors
    pub fn from_tensors(
        name: impl Into<String>,
        mut tensors: HashMap<String, Tensor>,
        device: Device,
    ) -> Result<Self> {
        let classes = tensors
            .remove(CLASSES)
            .ok_or_else(|| Error::corrupt("missing tensor 'classes'"))?
            .to_dtype(DType::I64)
            .and_then(|t| t.to_vec1::<i64>())
            .map_err(corrupt)?;
        if classes.is_empty() {
            return Err(Error::corrupt("artifact declares no classes"));
        }

        let scaler = match (tensors.remove(SCALER_MEAN), tensors.remove(SCALER_SCALE)) {
            (Some(mean), Some(scale)) => Some(Scaler::new(mean, scale)?),
            (None, None) => None,
            _ => {
                return Err(Error::corrupt(
                    "scaler needs both 'scaler.mean' and 'scaler.scale'",
                ))
            }
        };

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let linear = candle_nn::linear(FEATURE_COUNT, classes.len(), vb.pp(LINEAR_PREFIX))
            .map_err(corrupt)?;

        let name = name.into();
        debug!(
            "Built linear classifier '{}' with {} classes (scaler: {})",
            name,
            classes.len(),
            scaler.is_some()
        );

        Ok(Self {
            name,
            linear,
            scaler,
            classes,
            device,
        })
    }

    /// Labels this classifier can emit, in output order
    pub fn classes(&self) -> &[PredictionResult] {
        &self.classes
    }

    fn forward(&self, flat: Vec<f32>, n_rows: usize) -> candle_core::Result<Vec<u32>> {
        let x = Tensor::from_vec(flat, (n_rows, FEATURE_COUNT), &self.device)?;
        let x = match &self.scaler {
            Some(scaler) => scaler.apply(&x)?,
            None => x,
        };
        let logits = self.linear.forward(&x)?;
        logits.argmax(1)?.to_vec1::<u32>()
    }
}

/// Reject values the f32 forward pass cannot represent
fn check_finite(rows: &[FeatureVector]) -> Result<()> {
    for row in rows {
        for (name, value) in EXAM_FIELDS.iter().zip(row) {
            if !(*value as f32).is_finite() {
                return Err(Error::invalid_value(format!(
                    "Feature '{}' has a non-finite value: {}",
                    name, value
                )));
            }
        }
    }
    Ok(())
}

impl Predictor for LinearClassifier {
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<PredictionResult>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        check_finite(rows)?;

        let flat: Vec<f32> = rows
            .iter()
            .flat_map(|row| row.iter().map(|v| *v as f32))
            .collect();

        let indices = self
            .forward(flat, rows.len())
            .map_err(|e| Error::prediction(e.to_string()))?;

        indices
            .into_iter()
            .map(|idx| {
                self.classes.get(idx as usize).copied().ok_or_else(|| {
                    Error::prediction(format!("class index {} out of range", idx))
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Loads [`LinearClassifier`] artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeTensorsLoader;

impl SafeTensorsLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactLoader for SafeTensorsLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Predictor>> {
        Ok(Arc::new(LinearClassifier::load(path)?))
    }
}

/// Standardization parameters written alongside the weights
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerParams {
    pub mean: [f32; FEATURE_COUNT],
    pub scale: [f32; FEATURE_COUNT],
}

/// Plain parameters of a linear classifier, ready to be written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct LinearArtifact {
    /// One weight row per class
    pub weights: Vec<[f32; FEATURE_COUNT]>,

    /// One bias per class
    pub bias: Vec<f32>,

    /// Label emitted for each class row
    pub classes: Vec<PredictionResult>,

    /// Optional input standardization
    pub scaler: Option<ScalerParams>,
}

impl LinearArtifact {
    /// Write the artifact as a safetensors file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let n_classes = self.classes.len();
        if self.weights.len() != n_classes || self.bias.len() != n_classes {
            return Err(Error::invalid_value(format!(
                "expected {} weight rows and biases, got {} and {}",
                n_classes,
                self.weights.len(),
                self.bias.len()
            )));
        }

        let tensors = self.to_tensors().map_err(|e| Error::internal(e.to_string()))?;
        candle_core::safetensors::save(&tensors, path.as_ref())
            .map_err(|e| Error::internal(format!("Failed to write safetensors: {}", e)))
    }

    fn to_tensors(&self) -> candle_core::Result<HashMap<String, Tensor>> {
        let device = Device::Cpu;
        let n_classes = self.classes.len();

        let flat: Vec<f32> = self.weights.iter().flatten().copied().collect();
        let mut tensors = HashMap::new();
        tensors.insert(
            format!("{}.weight", LINEAR_PREFIX),
            Tensor::from_vec(flat, (n_classes, FEATURE_COUNT), &device)?,
        );
        tensors.insert(
            format!("{}.bias", LINEAR_PREFIX),
            Tensor::from_slice(&self.bias, n_classes, &device)?,
        );
        tensors.insert(
            CLASSES.to_string(),
            Tensor::from_slice(&self.classes, n_classes, &device)?,
        );

        if let Some(scaler) = &self.scaler {
            tensors.insert(
                SCALER_MEAN.to_string(),
                Tensor::from_slice(&scaler.mean, FEATURE_COUNT, &device)?,
            );
            tensors.insert(
                SCALER_SCALE.to_string(),
                Tensor::from_slice(&scaler.scale, FEATURE_COUNT, &device)?,
            );
        }

        Ok(tensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Class k scores feature k, so the argmax follows the first three features
    fn one_hot_artifact() -> LinearArtifact {
        let weights = (0..3)
            .map(|k| {
                let mut row = [0.0; FEATURE_COUNT];
                row[k] = 1.0;
                row
            })
            .collect();

        LinearArtifact {
            weights,
            bias: vec![0.0; 3],
            classes: vec![1, 2, 3],
            scaler: None,
        }
    }

    fn row(first: [f64; 3]) -> FeatureVector {
        let mut row = [0.0; FEATURE_COUNT];
        row[..3].copy_from_slice(&first);
        row
    }

    #[test]
    fn test_save_and_predict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        one_hot_artifact().save(&path).unwrap();

        let classifier = LinearClassifier::load(&path).unwrap();
        assert_eq!(classifier.name(), "model");
        assert_eq!(classifier.classes(), &[1, 2, 3]);

        let labels = classifier
            .predict(&[row([120.0, 0.003, 0.0]), row([0.0, 5.0, 1.0]), row([0.0, 0.0, 9.0])])
            .unwrap();
        assert_eq!(labels, vec![1, 2, 3]);
    }

    #[test]
    fn test_scaler_applied_before_linear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scaled.safetensors");

        let mut mean = [0.0; FEATURE_COUNT];
        mean[0] = 200.0;
        let artifact = LinearArtifact {
            scaler: Some(ScalerParams {
                mean,
                scale: [1.0; FEATURE_COUNT],
            }),
            ..one_hot_artifact()
        };
        artifact.save(&path).unwrap();

        let classifier = LinearClassifier::load(&path).unwrap();
        // 120 - 200 drops below the other two features
        let labels = classifier.predict(&[row([120.0, 0.003, 0.0])]).unwrap();
        assert_eq!(labels, vec![2]);
    }

    #[test]
    fn test_empty_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        one_hot_artifact().save(&path).unwrap();

        let classifier = LinearClassifier::load(&path).unwrap();
        assert!(classifier.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_feature_is_value_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        one_hot_artifact().save(&path).unwrap();

        let classifier = LinearClassifier::load(&path).unwrap();
        let err = classifier.predict(&[row([f64::NAN, 0.0, 0.0])]).unwrap_err();
        assert!(matches!(err, Error::InvalidValue(_)));
        assert!(err.to_string().contains("baseline_value"));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        std::fs::write(&path, b"definitely not safetensors").unwrap();

        let err = LinearClassifier::load(&path).err().unwrap();
        assert!(matches!(err, Error::ArtifactCorrupt(_)));
    }

    #[test]
    fn test_missing_classes_is_corrupt() {
        let mut tensors = one_hot_artifact().to_tensors().unwrap();
        tensors.remove(CLASSES);

        let err = LinearClassifier::from_tensors("m", tensors, Device::Cpu).err().unwrap();
        assert!(matches!(err, Error::ArtifactCorrupt(_)));
    }

    #[test]
    fn test_half_scaler_is_corrupt() {
        let mut tensors = one_hot_artifact().to_tensors().unwrap();
        tensors.insert(
            SCALER_MEAN.to_string(),
            Tensor::zeros(FEATURE_COUNT, DType::F32, &Device::Cpu).unwrap(),
        );

        let err = LinearClassifier::from_tensors("m", tensors, Device::Cpu).err().unwrap();
        assert!(matches!(err, Error::ArtifactCorrupt(_)));
    }

    #[test]
    fn test_wrong_feature_width_is_corrupt() {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "linear.weight".to_string(),
            Tensor::zeros((3, 7), DType::F32, &device).unwrap(),
        );
        tensors.insert(
            "linear.bias".to_string(),
            Tensor::zeros(3, DType::F32, &device).unwrap(),
        );
        tensors.insert(
            CLASSES.to_string(),
            Tensor::from_slice(&[1i64, 2, 3], 3, &device).unwrap(),
        );

        let err = LinearClassifier::from_tensors("m", tensors, device).err().unwrap();
        assert!(matches!(err, Error::ArtifactCorrupt(_)));
    }

    #[test]
    fn test_mismatched_artifact_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        let artifact = LinearArtifact {
            bias: vec![0.0; 2],
            ..one_hot_artifact()
        };

        assert!(artifact.save(&path).is_err());
        assert!(!path.exists());
    }
}
