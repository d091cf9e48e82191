//! Builder pattern for MovePlanner.

use crate::config::{validate_config, Kinematics, MachineConfig, MAX_DRIVES};
use crate::error::{ConfigError, Error, Result};
use crate::platform::Platform;

use super::MovePlanner;

/// Builder for creating MovePlanner instances.
pub struct MovePlannerBuilder<P>
where
    P: Platform,
{
    kinematics: Option<Kinematics>,
    platform: Option<P>,
    start_position: Option<heapless::Vec<f32, MAX_DRIVES>>,
}

impl<P> Default for MovePlannerBuilder<P>
where
    P: Platform,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> MovePlannerBuilder<P>
where
    P: Platform,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            kinematics: None,
            platform: None,
            start_position: None,
        }
    }

    /// Set the kinematics directly. They are validated by [`build`](Self::build).
    pub fn kinematics(mut self, kinematics: Kinematics) -> Self {
        self.kinematics = Some(kinematics);
        self
    }

    /// Configure from a MachineConfig.
    ///
    /// # Errors
    ///
    /// Returns the first validation error in `config`.
    pub fn from_config(mut self, config: &MachineConfig) -> Result<Self> {
        validate_config(config)?;
        self.kinematics = Some(Kinematics::from_config(config));
        Ok(self)
    }

    /// Set the platform.
    pub fn platform(mut self, platform: P) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set where the machine rests when the planner starts. Defaults to the origin.
    pub fn start_position(mut self, position: &[f32]) -> Self {
        self.start_position = Some(position.iter().copied().take(MAX_DRIVES).collect());
        self
    }

    /// Build the MovePlanner.
    ///
    /// # Errors
    ///
    /// Returns an error if kinematics or platform are missing, if the kinematics fail
    /// validation, or if the start position does not carry one coordinate per drive.
    pub fn build<const LA: usize, const DDA: usize>(self) -> Result<MovePlanner<P, LA, DDA>> {
        let kinematics = self
            .kinematics
            .ok_or(Error::Config(ConfigError::MissingField("kinematics")))?;
        let platform = self
            .platform
            .ok_or(Error::Config(ConfigError::MissingField("platform")))?;

        let mut planner = MovePlanner::new(kinematics, platform)?;
        if let Some(position) = self.start_position {
            planner.reset(&position)?;
        }
        Ok(planner)
    }
}
