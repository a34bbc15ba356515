//! Configuration module for rustmvs

#[allow(clippy::module_inception)]
mod config;
mod params;

pub use config::{ConfigError, ConfigLoader, MvsConfig};
pub use params::{FilteringAxes, SgmParams, TileParams};
