//! Unit tests for configuration validation.

use step_planner::config::{
    validate_config, DriveConfig, DriveKind, MachineConfig, Millimeters, MmPerSec,
    MmPerSecSquared, MAX_LOOK_AHEAD_DEPTH,
};
use step_planner::error::{ConfigError, Error};

fn x_axis() -> DriveConfig {
    DriveConfig::axis(
        "x",
        DriveKind::X,
        80.0,
        MmPerSec(200.0),
        MmPerSecSquared(1000.0),
        Millimeters(250.0),
    )
}

fn config_with(drives: &[DriveConfig]) -> MachineConfig {
    let mut config = MachineConfig::default();
    for drive in drives {
        config.drives.push(drive.clone()).unwrap();
    }
    config
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let config = config_with(&[
        x_axis(),
        DriveConfig::extruder("e0", 93.0, MmPerSec(50.0), MmPerSecSquared(3000.0)),
    ]);
    assert!(validate_config(&config).is_ok());
}

/// Test validation fails for an empty drive list.
#[test]
fn test_no_drives() {
    let result = validate_config(&MachineConfig::default());
    assert!(matches!(result, Err(Error::Config(ConfigError::NoDrives))));
}

/// Test validation fails for duplicate drive names.
#[test]
fn test_duplicate_drive_name() {
    let config = config_with(&[x_axis(), x_axis()]);
    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateDriveName(ref name))) if name.as_str() == "x"
    ));
}

/// Test validation fails for non-positive or NaN rates.
#[test]
fn test_invalid_drive_rates() {
    let mut drive = x_axis();
    drive.steps_per_mm = f32::NAN;
    assert!(matches!(
        validate_config(&config_with(&[drive])),
        Err(Error::Config(ConfigError::InvalidStepsPerMm(_)))
    ));

    let mut drive = x_axis();
    drive.max_feedrate = MmPerSec(0.0);
    assert!(matches!(
        validate_config(&config_with(&[drive])),
        Err(Error::Config(ConfigError::InvalidMaxFeedrate(_)))
    ));

    let drive = x_axis().with_instant_dv(MmPerSec(-1.0));
    assert!(matches!(
        validate_config(&config_with(&[drive])),
        Err(Error::Config(ConfigError::InvalidInstantDv(_)))
    ));
}

/// Test look-ahead depth bounds.
#[test]
fn test_look_ahead_depth_bounds() {
    let mut config = config_with(&[x_axis()]);

    config.planner.look_ahead_depth = MAX_LOOK_AHEAD_DEPTH;
    assert!(validate_config(&config).is_ok());

    config.planner.look_ahead_depth = MAX_LOOK_AHEAD_DEPTH + 1;
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidLookAheadDepth { .. }))
    ));

    config.planner.look_ahead_depth = 0;
    assert!(validate_config(&config).is_err());
}

/// Test the error message names the offending value.
#[test]
fn test_error_display() {
    let mut config = config_with(&[x_axis()]);
    config.planner.junction_deviation = Millimeters(-0.5);

    let error = validate_config(&config).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Configuration error: Invalid junction deviation: -0.5. Must be > 0"
    );
}
