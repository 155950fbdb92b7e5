//! Configuration type definitions
//!
//! Every section defaults to the reference behaviour, so an empty
//! configuration file yields a working node.

use heapless::String;

use crate::bridge::ErrorPolicy;
use crate::scheduler::Priority;
use crate::tasks::counter::DutyCycle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum display title length
pub const MAX_TITLE_LEN: usize = 32;

/// Maximum endpoint path length
pub const MAX_PATH_LEN: usize = 32;

/// Counter task configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterConfig {
    /// Period in milliseconds
    pub period_ms: u32,
    /// Scheduling priority (larger is more urgent)
    pub priority: u8,
    /// Count at which the display task is suspended
    pub suspend_at: u32,
    /// Count at which the display task is resumed
    pub resume_at: u32,
}

impl CounterConfig {
    /// Suspend/resume thresholds as a duty cycle
    pub fn duty_cycle(&self) -> DutyCycle {
        DutyCycle::new(self.suspend_at, self.resume_at)
    }

    /// Scheduling priority
    pub fn priority(&self) -> Priority {
        Priority(self.priority)
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            priority: 2,
            suspend_at: 6,
            resume_at: 9,
        }
    }
}

/// Sensor task configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    /// Period in milliseconds
    pub period_ms: u32,
    /// Scheduling priority (larger is more urgent)
    pub priority: u8,
    /// 7-bit I2C address of the TMP100
    pub address: u8,
    /// Conversion resolution in bits (9-12)
    pub resolution_bits: u8,
    /// What to do with a failed transaction
    pub error_policy: ErrorPolicy,
}

impl SensorConfig {
    /// Scheduling priority
    pub fn priority(&self) -> Priority {
        Priority(self.priority)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            priority: 3,
            address: 0x4A,
            resolution_bits: 12,
            error_policy: ErrorPolicy::Record,
        }
    }
}

/// Display task configuration and screen layout
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayConfig {
    /// Period in milliseconds
    pub period_ms: u32,
    /// Scheduling priority (larger is more urgent)
    pub priority: u8,
    /// Application frame title
    pub title: String<MAX_TITLE_LEN>,
    /// X position of the static labels
    pub label_x: u16,
    /// X position of the counter value
    pub count_x: u16,
    /// Y position of the counter row
    pub count_y: u16,
    /// X position of the temperature value
    pub temperature_x: u16,
    /// Y position of the temperature row
    pub temperature_y: u16,
}

impl DisplayConfig {
    /// Scheduling priority
    pub fn priority(&self) -> Priority {
        Priority(self.priority)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let mut title = String::new();
        let _ = title.push_str("vigil - monitor");
        Self {
            period_ms: 1000,
            priority: 1,
            title,
            label_x: 90,
            count_x: 195,
            count_y: 108,
            temperature_x: 195,
            temperature_y: 70,
        }
    }
}

/// Query endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EndpointConfig {
    /// Whether the endpoint task is started
    pub enabled: bool,
    /// Path that returns the current readings
    pub data_path: String<MAX_PATH_LEN>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let mut data_path = String::new();
        let _ = data_path.push_str("/dataread");
        Self {
            enabled: true,
            data_path,
        }
    }
}

/// Complete node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeConfig {
    pub counter: CounterConfig,
    pub sensor: SensorConfig,
    pub display: DisplayConfig,
    pub endpoint: EndpointConfig,
}

/// Semantic configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A task period is zero
    ZeroPeriod(&'static str),
    /// `suspend_at` must be below `resume_at`
    InvalidThresholds,
    /// TMP100 supports 9 to 12 bits
    UnsupportedResolution(u8),
    /// Address outside the 7-bit range
    InvalidAddress(u8),
    /// Data path must start with '/'
    InvalidDataPath,
}

impl NodeConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Check cross-field constraints the parser cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.counter.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("counter"));
        }
        if self.sensor.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("sensor"));
        }
        if self.display.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("display"));
        }
        if self.counter.suspend_at >= self.counter.resume_at {
            return Err(ConfigError::InvalidThresholds);
        }
        if !(9..=12).contains(&self.sensor.resolution_bits) {
            return Err(ConfigError::UnsupportedResolution(
                self.sensor.resolution_bits,
            ));
        }
        if self.sensor.address > 0x7F {
            return Err(ConfigError::InvalidAddress(self.sensor.address));
        }
        if !self.endpoint.data_path.starts_with('/') {
            return Err(ConfigError::InvalidDataPath);
        }
        Ok(())
    }
}
