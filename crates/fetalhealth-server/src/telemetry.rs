//! Logging and Prometheus metrics setup

use anyhow::Context;
use fetalhealth_model::MODEL_LOADS_TOTAL;
use metrics::Unit;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prediction requests, labelled by `outcome`
pub const REQUESTS_TOTAL: &str = "fetalhealth_requests_total";

/// Wall time of one `ModelHolder::inference` call
pub const INFERENCE_LATENCY_US: &str = "fetalhealth_inference_latency_us";

const DEFAULT_FILTER: &str = "fetalhealth=info";
const VERBOSE_FILTER: &str = "fetalhealth=debug,tower_http=debug";

/// Log filter: `--verbose` wins, then `RUST_LOG`, then the default
pub fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(log_filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Install the global Prometheus recorder and describe every series the
/// service emits.
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    for (name, help) in [
        (REQUESTS_TOTAL, "Prediction requests by outcome"),
        (MODEL_LOADS_TOTAL, "Model artifact load attempts by result"),
    ] {
        metrics::describe_counter!(name, help);
    }
    metrics::describe_histogram!(
        INFERENCE_LATENCY_US,
        Unit::Microseconds,
        "Model inference latency"
    );

    tracing::debug!("Prometheus recorder installed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter_overrides_env() {
        let filter = log_filter(true).to_string();
        assert!(filter.contains("fetalhealth=debug"), "{filter}");
        assert!(filter.contains("tower_http=debug"), "{filter}");
    }

    #[test]
    fn test_metric_names_are_namespaced() {
        for name in [REQUESTS_TOTAL, INFERENCE_LATENCY_US, MODEL_LOADS_TOTAL] {
            assert!(name.starts_with("fetalhealth_"), "{name}");
        }
    }
}
