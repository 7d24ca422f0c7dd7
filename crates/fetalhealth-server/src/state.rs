use crate::config::ServiceConfig;
use fetalhealth_model::ModelHolder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServiceConfig>,

    /// The served model
    pub holder: Arc<ModelHolder>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state serving the safetensors artifact named in the config
    pub fn new(config: ServiceConfig, metrics_handle: Option<PrometheusHandle>) -> Self {
        let holder = Arc::new(ModelHolder::with_safetensors(&config.model_path));
        Self {
            config: Arc::new(config),
            holder,
            metrics_handle,
        }
    }

    /// Build state around an existing holder
    pub fn with_holder(config: ServiceConfig, holder: Arc<ModelHolder>) -> Self {
        Self {
            config: Arc::new(config),
            holder,
            metrics_handle: None,
        }
    }

    /// Try to load the model ahead of the first request.
    ///
    /// A failure is not fatal: requests get 503 until a later load succeeds.
    pub async fn preload(&self) -> anyhow::Result<bool> {
        let holder = self.holder.clone();
        let loaded = tokio::task::spawn_blocking(move || holder.load_model()).await?;

        if loaded {
            info!("Model preloaded from {}", self.holder.artifact_path().display());
        } else {
            warn!(
                "Model not available at {}; will retry on the next prediction request",
                self.holder.artifact_path().display()
            );
        }
        Ok(loaded)
    }
}
