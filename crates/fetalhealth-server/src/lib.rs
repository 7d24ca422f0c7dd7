//! Fetal Health Server
//!
//! HTTP surface of the fetal health inference service. `POST /predict`
//! validates one cardiotocography exam, lazily loads the model if needed and
//! returns the predicted fetal health class.

pub mod cli;
pub mod config;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use cli::Cli;
pub use config::ServiceConfig;
pub use routes::{create_router, ApiError, ErrorBody, PredictResponse};
pub use state::AppState;
