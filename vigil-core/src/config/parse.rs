//! Simple TOML parser for node configuration
//!
//! This is a minimal parser that handles only the subset needed for the
//! node configuration. It does NOT support full TOML.
//!
//! Supported features:
//! - Key = value pairs (string, integer, boolean)
//! - Integers in decimal or `0x` hexadecimal
//! - [section] headers
//! - Comments (# ...)
//!
//! Unknown sections and keys are skipped so older firmware accepts newer
//! files.

use heapless::String;

use crate::bridge::ErrorPolicy;

use super::types::NodeConfig;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid section header
    InvalidSection {
        /// 1-based line number
        line: usize,
    },
    /// Line is neither a header nor `key = value`
    InvalidLine {
        /// 1-based line number
        line: usize,
    },
    /// Value has the wrong type or is out of range
    InvalidValue {
        /// 1-based line number
        line: usize,
    },
    /// String does not fit its fixed-capacity field
    TooLong {
        /// 1-based line number
        line: usize,
    },
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Counter,
    Sensor,
    Display,
    Endpoint,
    Unknown,
}

/// Value-level error, tagged with a line number by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueError {
    Invalid,
    TooLong,
}

impl ValueError {
    fn at(self, line: usize) -> ParseError {
        match self {
            ValueError::Invalid => ParseError::InvalidValue { line },
            ValueError::TooLong => ParseError::TooLong { line },
        }
    }
}

/// Parse TOML configuration into NodeConfig
///
/// Keys that are absent keep their default value.
pub fn parse_config(input: &str) -> Result<NodeConfig, ParseError> {
    let mut config = NodeConfig::default();
    let mut section = Section::Root;

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            section = parse_section_header(line)
                .ok_or(ParseError::InvalidSection { line: line_no })?;
            continue;
        }

        let (key, value) =
            parse_key_value(line).ok_or(ParseError::InvalidLine { line: line_no })?;

        apply_value(&mut config, section, key, value).map_err(|e| e.at(line_no))?;
    }

    Ok(config)
}

fn parse_section_header(line: &str) -> Option<Section> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let section = match name {
        "counter" => Section::Counter,
        "sensor" => Section::Sensor,
        "display" => Section::Display,
        "endpoint" => Section::Endpoint,
        "" => return None,
        _ => Section::Unknown,
    };
    Some(section)
}

/// Split `key = value`, dropping any trailing comment outside quotes
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    let value = match value.find('#') {
        Some(hash_pos) if value[..hash_pos].matches('"').count() % 2 == 0 => {
            value[..hash_pos].trim()
        }
        _ => value,
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a quoted string value
fn parse_string(value: &str) -> Result<&str, ValueError> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or(ValueError::Invalid)
}

fn parse_bounded<const N: usize>(value: &str) -> Result<String<N>, ValueError> {
    let text = parse_string(value)?;
    let mut out = String::new();
    out.push_str(text).map_err(|_| ValueError::TooLong)?;
    Ok(out)
}

/// Parse a decimal or `0x` hexadecimal integer
fn parse_int<T: TryFrom<u64>>(value: &str) -> Result<T, ValueError> {
    let raw = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    }
    .map_err(|_| ValueError::Invalid)?;

    T::try_from(raw).map_err(|_| ValueError::Invalid)
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ValueError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ValueError::Invalid),
    }
}

fn parse_policy(value: &str) -> Result<ErrorPolicy, ValueError> {
    match parse_string(value)? {
        "record" => Ok(ErrorPolicy::Record),
        "abort" => Ok(ErrorPolicy::Abort),
        _ => Err(ValueError::Invalid),
    }
}

fn apply_value(
    config: &mut NodeConfig,
    section: Section,
    key: &str,
    value: &str,
) -> Result<(), ValueError> {
    match section {
        Section::Counter => {
            let counter = &mut config.counter;
            match key {
                "period_ms" => counter.period_ms = parse_int(value)?,
                "priority" => counter.priority = parse_int(value)?,
                "suspend_at" => counter.suspend_at = parse_int(value)?,
                "resume_at" => counter.resume_at = parse_int(value)?,
                _ => {}
            }
        }
        Section::Sensor => {
            let sensor = &mut config.sensor;
            match key {
                "period_ms" => sensor.period_ms = parse_int(value)?,
                "priority" => sensor.priority = parse_int(value)?,
                "address" => sensor.address = parse_int(value)?,
                "resolution_bits" => sensor.resolution_bits = parse_int(value)?,
                "error_policy" => sensor.error_policy = parse_policy(value)?,
                _ => {}
            }
        }
        Section::Display => {
            let display = &mut config.display;
            match key {
                "period_ms" => display.period_ms = parse_int(value)?,
                "priority" => display.priority = parse_int(value)?,
                "title" => display.title = parse_bounded(value)?,
                "label_x" => display.label_x = parse_int(value)?,
                "count_x" => display.count_x = parse_int(value)?,
                "count_y" => display.count_y = parse_int(value)?,
                "temperature_x" => display.temperature_x = parse_int(value)?,
                "temperature_y" => display.temperature_y = parse_int(value)?,
                _ => {}
            }
        }
        Section::Endpoint => {
            let endpoint = &mut config.endpoint;
            match key {
                "enabled" => endpoint.enabled = parse_bool(value)?,
                "data_path" => endpoint.data_path = parse_bounded(value)?,
                _ => {}
            }
        }
        Section::Root | Section::Unknown => {}
    }
    Ok(())
}
