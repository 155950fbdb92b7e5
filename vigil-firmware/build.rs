//! Build script for vigil-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates node.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths and scripts
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate node.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=node.toml");

    let config_path = Path::new("node.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: node.toml not found!                                     ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds a node.toml configuration file.             ║\n\
            ║  Please create one in the vigil-firmware directory.              ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read node.toml                                 ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in node.toml                         ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_counter(&config, &mut errors);
    validate_sensor(&config, &mut errors);
    validate_display(&config, &mut errors);
    validate_endpoint(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid node configuration                               ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=node.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every section present must be a table; the task sections are required
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    for name in ["counter", "sensor", "display"] {
        match config.get(name) {
            Some(toml::Value::Table(_)) => {}
            Some(_) => errors.push(format!("[{}] must be a table", name)),
            None => errors.push(format!("Missing [{}] section", name)),
        }
    }
    if let Some(endpoint) = config.get("endpoint") {
        if !endpoint.is_table() {
            errors.push("[endpoint] must be a table".to_string());
        }
    }
}

/// Integer field within `min..=max`, if present
fn check_range(
    config: &toml::Value,
    section: &str,
    key: &str,
    min: i64,
    max: i64,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match config.get(section).and_then(|s| s.get(key)) {
        Some(toml::Value::Integer(v)) => {
            if *v < min || *v > max {
                errors.push(format!("[{}] {} must be {}-{}", section, key, min, max));
                None
            } else {
                Some(*v)
            }
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            None
        }
        None => None,
    }
}

/// Period and priority shared by every task section
fn check_task(config: &toml::Value, section: &str, errors: &mut Vec<String>) {
    check_range(config, section, "period_ms", 1, u32::MAX.into(), errors);
    check_range(config, section, "priority", 0, u8::MAX.into(), errors);
}

fn validate_counter(config: &toml::Value, errors: &mut Vec<String>) {
    check_task(config, "counter", errors);

    let suspend_at = check_range(config, "counter", "suspend_at", 0, u32::MAX.into(), errors);
    let resume_at = check_range(config, "counter", "resume_at", 0, u32::MAX.into(), errors);
    if let (Some(suspend_at), Some(resume_at)) = (suspend_at, resume_at) {
        if suspend_at >= resume_at {
            errors.push("[counter] suspend_at must be below resume_at".to_string());
        }
    }
}

fn validate_sensor(config: &toml::Value, errors: &mut Vec<String>) {
    check_task(config, "sensor", errors);
    check_range(config, "sensor", "address", 0x08, 0x77, errors);
    check_range(config, "sensor", "resolution_bits", 9, 12, errors);

    match config.get("sensor").and_then(|s| s.get("error_policy")) {
        Some(toml::Value::String(policy)) => {
            if !["record", "abort"].contains(&policy.as_str()) {
                errors.push("[sensor] error_policy must be 'record' or 'abort'".to_string());
            }
        }
        Some(_) => errors.push("[sensor] error_policy must be a string".to_string()),
        None => {}
    }
}

fn validate_display(config: &toml::Value, errors: &mut Vec<String>) {
    check_task(config, "display", errors);
    for key in ["label_x", "count_x", "count_y", "temperature_x", "temperature_y"] {
        check_range(config, "display", key, 0, u16::MAX.into(), errors);
    }

    if let Some(title) = config.get("display").and_then(|s| s.get("title")) {
        match title.as_str() {
            Some(text) if text.len() > 32 => {
                errors.push("[display] title must be at most 32 bytes".to_string())
            }
            Some(_) => {}
            None => errors.push("[display] title must be a string".to_string()),
        }
    }
}

fn validate_endpoint(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(endpoint) = config.get("endpoint") else {
        return;
    };

    if let Some(enabled) = endpoint.get("enabled") {
        if !enabled.is_bool() {
            errors.push("[endpoint] enabled must be true or false".to_string());
        }
    }

    if let Some(path) = endpoint.get("data_path") {
        match path.as_str() {
            Some(p) if !p.starts_with('/') => {
                errors.push("[endpoint] data_path must start with '/'".to_string())
            }
            Some(p) if p.len() > 32 => {
                errors.push("[endpoint] data_path must be at most 32 bytes".to_string())
            }
            Some(_) => {}
            None => errors.push("[endpoint] data_path must be a string".to_string()),
        }
    }
}
