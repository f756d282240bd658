//! appgrid-core — shared platform configuration for AppGrid crates.

pub mod config;

pub use config::{ConfigError, PlatformConfig, parse_duration};
