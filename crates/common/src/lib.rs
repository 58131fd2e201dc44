pub mod config;
pub mod error;
pub mod utils;

pub use config::error::ConfigError;
