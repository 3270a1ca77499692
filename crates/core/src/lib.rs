pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{BanditError, BanditResult, BatchFailure};
pub use types::{Observation, ParameterSnapshot, Probabilities, Selection};
