//! Fetal Health Model
//!
//! Model lifecycle and inference for the fetal health service.
//!
//! - [`ModelHolder`] owns the single served model, loads it from a fixed
//!   artifact path and runs inference over it
//! - [`Predictor`] and [`ArtifactLoader`] are the seams between the holder
//!   and a concrete model format
//! - [`LinearClassifier`] is the Candle-backed safetensors format served by
//!   default

pub mod holder;
pub mod linear;
pub mod predictor;

pub use holder::{ModelHolder, MODEL_LOADS_TOTAL};
pub use linear::{LinearArtifact, LinearClassifier, SafeTensorsLoader, ScalerParams};
pub use predictor::{ArtifactLoader, Predictor};

