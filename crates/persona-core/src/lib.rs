pub mod config;
pub mod error;
pub mod types;

pub use config::PersonaConfig;
pub use error::{PersonaError, Result};
pub use types::*;
