//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::motion::{DDA_RING_LENGTH, LOOK_AHEAD_RING_LENGTH};

use super::{DriveConfig, DriveLimits, Kinematics, MachineConfig};

/// Deepest look-ahead the default rings can hold back while keeping the execution
/// ring fed.
///
/// With the execution ring full and one record executing, `DDA_RING_LENGTH - 1`
/// committed moves still occupy look-ahead slots, and one more pending move than the
/// depth is needed before the next commit.
pub const MAX_LOOK_AHEAD_DEPTH: usize =
    max_look_ahead_depth(LOOK_AHEAD_RING_LENGTH, DDA_RING_LENGTH);

/// Deepest look-ahead for rings of `look_ahead` and `dda` slots, at least 1.
pub const fn max_look_ahead_depth(look_ahead: usize, dda: usize) -> usize {
    let depth = look_ahead.saturating_sub(dda + 2);
    if depth == 0 {
        1
    } else {
        depth
    }
}

/// Validate a machine configuration.
///
/// Checks:
/// - At least one drive is configured and names are unique
/// - Drive rates are positive
/// - Axis drives have a positive length
/// - Planner tuning is in range
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    if config.drives.is_empty() {
        return Err(Error::Config(ConfigError::NoDrives));
    }

    for (i, drive) in config.drives.iter().enumerate() {
        if config.drives[..i].iter().any(|d| d.name == drive.name) {
            return Err(Error::Config(ConfigError::DuplicateDriveName(drive.name.clone())));
        }
        validate_drive(drive)?;
    }

    let deviation = config.planner.junction_deviation.0;
    if !(deviation > 0.0) {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(deviation)));
    }

    let depth = config.planner.look_ahead_depth;
    if depth == 0 || depth > MAX_LOOK_AHEAD_DEPTH {
        return Err(Error::Config(ConfigError::InvalidLookAheadDepth {
            depth,
            max: MAX_LOOK_AHEAD_DEPTH,
        }));
    }

    Ok(())
}

/// Validate kinematics that were not derived from a validated configuration.
///
/// Applies the drive and junction checks of [`validate_config`]. The look-ahead
/// depth is not checked here; the planner clamps it to its ring lengths.
pub fn validate_kinematics(kinematics: &Kinematics) -> Result<()> {
    if kinematics.drive_count() == 0 {
        return Err(Error::Config(ConfigError::NoDrives));
    }

    for limits in kinematics.drives() {
        validate_limits(limits)?;
    }

    let deviation = kinematics.junction_deviation;
    if !(deviation > 0.0) {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(deviation)));
    }

    Ok(())
}

fn validate_drive(drive: &DriveConfig) -> Result<()> {
    validate_limits(&DriveLimits::from_config(drive))
}

fn validate_limits(limits: &DriveLimits) -> Result<()> {
    // NaN fails every comparison, so test for the valid range
    if !(limits.steps_per_mm > 0.0) {
        return Err(Error::Config(ConfigError::InvalidStepsPerMm(limits.steps_per_mm)));
    }

    if !(limits.max_feedrate > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMaxFeedrate(limits.max_feedrate)));
    }

    if !(limits.max_acceleration > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration(
            limits.max_acceleration,
        )));
    }

    if !(limits.instant_dv >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidInstantDv(limits.instant_dv)));
    }

    if limits.is_axis() && !(limits.axis_length > 0.0) {
        return Err(Error::Config(ConfigError::InvalidAxisLength(limits.axis_length)));
    }

    Ok(())
}
