//! Unit tests for TOML configuration parsing.

use step_planner::config::{load_config, parse_config, DriveKind, Kinematics};
use step_planner::error::{ConfigError, Error};

const CARTESIAN: &str = r#"
[[drives]]
name = "x"
kind = "x"
steps_per_mm = 100.0
max_feedrate_mm_per_sec = 300.0
max_acceleration_mm_per_sec2 = 3000.0
axis_length_mm = 300.0
instant_dv_mm_per_sec = 10.0

[[drives]]
name = "y"
kind = "y"
steps_per_mm = 100.0
max_feedrate_mm_per_sec = 300.0
max_acceleration_mm_per_sec2 = 3000.0
axis_length_mm = 300.0
invert_direction = true

[[drives]]
name = "e0"
kind = "extruder"
steps_per_mm = 415.0
max_feedrate_mm_per_sec = 60.0
max_acceleration_mm_per_sec2 = 1500.0

[planner]
junction_deviation_mm = 0.08
look_ahead_depth = 12
idle_interrupt_us = 500
"#;

/// Test parsing drives and planner tuning from TOML.
#[test]
fn test_parse_machine_config() {
    let config = parse_config(CARTESIAN).expect("Failed to parse TOML");

    assert_eq!(config.drive_count(), 3);
    let x = config.drive("x").expect("Drive not found");
    assert_eq!(x.kind, DriveKind::X);
    assert_eq!(x.instant_dv.0, 10.0);
    assert_eq!(x.axis_length.map(|l| l.0), Some(300.0));
    assert!(config.drive("y").unwrap().invert_direction);
    assert_eq!(config.drive("e0").unwrap().axis_length, None);
    assert_eq!(config.planner.look_ahead_depth, 12);
    assert_eq!(config.planner.idle_interrupt_us, 500);
}

/// Test that kinematics carries the parsed values in endpoint order.
#[test]
fn test_kinematics_from_parsed_config() {
    let config = parse_config(CARTESIAN).expect("Failed to parse TOML");
    let kinematics = Kinematics::from_config(&config);

    assert_eq!(kinematics.drive_count(), 3);
    assert!((kinematics.junction_deviation - 0.08).abs() < 1e-6);
    assert_eq!(kinematics.idle_interval_ns, 500_000);
    assert!(kinematics.drive(1).invert_direction);
    assert!(!kinematics.drive(2).is_axis());
    assert_eq!(kinematics.drive(2).mm_to_steps(2.0), 830);
}

/// Test loading from a file on disk.
#[test]
fn test_load_config_from_file() {
    let path = std::env::temp_dir().join(format!("step-planner-{}.toml", std::process::id()));
    std::fs::write(&path, CARTESIAN).expect("Failed to write config");

    let config = load_config(&path);
    let _ = std::fs::remove_file(&path);

    assert_eq!(config.expect("Failed to load config").drive_count(), 3);
}

/// Test that a missing file is an I/O error.
#[test]
fn test_missing_file_is_io_error() {
    let result = load_config("/nonexistent/step-planner/machine.toml");
    assert!(matches!(result, Err(Error::Config(ConfigError::IoError(_)))));
}

/// Test that an unknown drive kind is rejected by the parser.
#[test]
fn test_unknown_drive_kind() {
    let toml_str = r#"
[[drives]]
name = "a"
kind = "rotary"
steps_per_mm = 10.0
max_feedrate_mm_per_sec = 10.0
max_acceleration_mm_per_sec2 = 10.0
"#;

    assert!(matches!(
        parse_config(toml_str),
        Err(Error::Config(ConfigError::ParseError(_)))
    ));
}
