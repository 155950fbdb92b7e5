//! Configuration loading
//!
//! The node configuration is compiled into the firmware from node.toml
//! (validated by build.rs) and parsed at boot. Anything the core parser or
//! validator rejects falls back to the built-in defaults.

use defmt::*;

use vigil_core::config::{parse_config, NodeConfig};

/// Embedded configuration (compiled into firmware)
/// Edit node.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../../node.toml");

/// Load the embedded configuration, or the defaults if it is unusable
pub fn load_config() -> NodeConfig {
    let config = match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse node.toml: {:?}, using defaults", e);
            return NodeConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => {
            info!("Loaded configuration from node.toml");
            config
        }
        Err(e) => {
            error!("Invalid node.toml: {:?}, using defaults", e);
            NodeConfig::default()
        }
    }
}
