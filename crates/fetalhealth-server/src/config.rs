//! Service configuration

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Model artifact path
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Load the model before accepting requests
    #[serde(default = "default_true")]
    pub preload_model: bool,
}

impl ServiceConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_overrides(cli);
        Ok(config)
    }

    fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(model) = &cli.model {
            self.model_path = model.clone();
        }

        if let Some(listen) = &cli.listen {
            self.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            self.port = port;
        }

        if cli.no_preload {
            self.preload_model = false;
        }
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.listen, self.port).parse()?)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            listen: default_listen(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            preload_model: true,
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model_at.safetensors")
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["fetalhealth-server"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.model_path, PathBuf::from("model_at.safetensors"));
        assert_eq!(config.port, 5001);
        assert!(config.preload_model);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:5001");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: ServiceConfig = serde_yaml::from_str(
            r#"
model_path: "/srv/models/fetal.safetensors"
port: 8080
"#,
        )
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/srv/models/fetal.safetensors"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.body_limit_bytes, 64 * 1024);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: ServiceConfig =
            serde_yaml::from_str("port: 8080\nlisten: \"10.0.0.1\"\n").unwrap();
        config.apply_overrides(&cli(&["--port", "9000", "--model", "m.safetensors", "--no-preload"]));

        assert_eq!(config.port, 9000);
        assert_eq!(config.listen, "10.0.0.1");
        assert_eq!(config.model_path, PathBuf::from("m.safetensors"));
        assert!(!config.preload_model);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            ServiceConfig::load("/nonexistent/fetalhealth.yaml", &cli(&["-l", "127.0.0.1"]))
                .unwrap();
        assert_eq!(config.listen, "127.0.0.1");
        assert_eq!(config.port, 5001);
    }

    #[test]
    fn test_invalid_listen_address() {
        let config = ServiceConfig {
            listen: "not an address".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
