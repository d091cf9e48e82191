//! Error types for step-planner.
//!
//! Provides unified error handling across configuration, move queueing, and drive output.
//!
//! None of these are fatal: queue and ring errors mean "not now" and the caller retries on
//! its next pass. An infeasible velocity profile is resolved inside the planner and never
//! shows up here, and an end-stop hit is reported as an [`EndStopEvent`](crate::motion::EndStopEvent),
//! not as an error.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all step-planner operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Move queueing or ring hand-off error
    Move(MoveError),
    /// Drive output error
    Drive(DriveError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// A required builder field was not provided
    MissingField(&'static str),
    /// No drives configured
    NoDrives,
    /// Duplicate drive name in configuration
    DuplicateDriveName(heapless::String<32>),
    /// Invalid steps per millimetre (must be > 0)
    InvalidStepsPerMm(f32),
    /// Invalid max feedrate (must be > 0)
    InvalidMaxFeedrate(f32),
    /// Invalid max acceleration (must be > 0)
    InvalidMaxAcceleration(f32),
    /// Invalid instantaneous velocity change (must be >= 0)
    InvalidInstantDv(f32),
    /// Invalid axis length (must be > 0 for axis drives)
    InvalidAxisLength(f32),
    /// Invalid junction deviation (must be > 0)
    InvalidJunctionDeviation(f32),
    /// Look-ahead depth must be between 1 and the usable queue capacity
    InvalidLookAheadDepth {
        /// Configured depth
        depth: usize,
        /// Largest accepted depth
        max: usize,
    },
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Move queueing errors.
///
/// `QueueFull`, `RingFull` and `LockUnavailable` are transient: retry on the next pass.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveError {
    /// Look-ahead queue has no reclaimable slot
    QueueFull,
    /// Execution ring is full, hand-off deferred to the next spin
    RingFull,
    /// The execution ring is held by the other context
    LockUnavailable,
    /// New moves are refused until `resume_moving` is called
    Suspended,
    /// Endpoint does not carry one coordinate per configured drive
    DriveCountMismatch {
        /// Configured drive count
        expected: usize,
        /// Coordinates supplied
        actual: usize,
    },
    /// Drive index out of range
    InvalidDrive(usize),
    /// Feedrate is not a finite positive number
    InvalidFeedrate(f32),
    /// Look-ahead slot index out of range
    InvalidSlot(usize),
}

/// Drive output errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DriveError {
    /// Pin operation failed
    PinError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Move(e) => write!(f, "Move error: {}", e),
            Error::Drive(e) => write!(f, "Drive error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::MissingField(field) => write!(f, "{} is required", field),
            ConfigError::NoDrives => write!(f, "At least one drive must be configured"),
            ConfigError::DuplicateDriveName(name) => write!(f, "Duplicate drive name: '{}'", name),
            ConfigError::InvalidStepsPerMm(v) => write!(f, "Invalid steps per mm: {}. Must be > 0", v),
            ConfigError::InvalidMaxFeedrate(v) => write!(f, "Invalid max feedrate: {}. Must be > 0", v),
            ConfigError::InvalidMaxAcceleration(v) => {
                write!(f, "Invalid max acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidInstantDv(v) => write!(f, "Invalid instant dv: {}. Must be >= 0", v),
            ConfigError::InvalidAxisLength(v) => write!(f, "Invalid axis length: {}. Must be > 0", v),
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be > 0", v)
            }
            ConfigError::InvalidLookAheadDepth { depth, max } => {
                write!(f, "Invalid look-ahead depth: {}. Must be 1-{}", depth, max)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::QueueFull => write!(f, "Look-ahead queue is full"),
            MoveError::RingFull => write!(f, "Execution ring is full"),
            MoveError::LockUnavailable => write!(f, "Execution ring is locked"),
            MoveError::Suspended => write!(f, "Moves are suspended until resumed"),
            MoveError::DriveCountMismatch { expected, actual } => {
                write!(f, "Expected {} drive coordinates, got {}", expected, actual)
            }
            MoveError::InvalidDrive(drive) => write!(f, "Drive {} does not exist", drive),
            MoveError::InvalidFeedrate(v) => write!(f, "Invalid feedrate: {}", v),
            MoveError::InvalidSlot(slot) => write!(f, "Look-ahead slot {} does not exist", slot),
        }
    }
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveError::PinError => write!(f, "GPIO pin operation failed"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MoveError> for Error {
    fn from(e: MoveError) -> Self {
        Error::Move(e)
    }
}

impl From<DriveError> for Error {
    fn from(e: DriveError) -> Self {
        Error::Drive(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MoveError {}

#[cfg(feature = "std")]
impl std::error::Error for DriveError {}
