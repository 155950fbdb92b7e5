//! Node configuration
//!
//! Type definitions for the node configuration and a small line-oriented
//! parser for the TOML subset the firmware embeds at build time.

pub mod parse;
pub mod types;

pub use parse::{parse_config, ParseError};
pub use types::{
    ConfigError, CounterConfig, DisplayConfig, EndpointConfig, NodeConfig, SensorConfig,
    MAX_PATH_LEN, MAX_TITLE_LEN,
};
