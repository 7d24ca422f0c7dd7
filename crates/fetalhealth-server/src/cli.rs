use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetalhealth-server")]
#[command(
    author,
    version,
    about = "Fetal health classification inference service"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Model artifact path
    #[arg(short, long, env = "FETALHEALTH_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "FETALHEALTH_PORT")]
    pub port: Option<u16>,

    /// Skip loading the model at startup
    #[arg(long)]
    pub no_preload: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
