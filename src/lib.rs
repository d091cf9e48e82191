//! # step-planner
//!
//! Look-ahead motion planning and interrupt-driven step generation for stepper-based
//! printers and CNC machines, with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Look-ahead smoothing**: queued moves are joined at the fastest speed the corner
//!   and the drives allow, and slowed early enough to stop at the end of the queue
//! - **Trapezoidal profiles**: every move accelerates, cruises and decelerates, or
//!   runs a triangle when it is too short to cruise
//! - **Bresenham stepping**: all drives of a move finish on the same tick
//! - **End stops**: a drive that meets a switch stops and its position is corrected
//! - **no_std compatible**: fixed-capacity rings, no allocation
//! - **Configuration-driven**: drives and tuning from TOML files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use step_planner::{MovePlanner, PinPlatform, DrivePins};
//!
//! let config = step_planner::load_config("machine.toml")?;
//! let kinematics = step_planner::Kinematics::from_config(&config);
//!
//! let platform = PinPlatform::new(&kinematics, delay)
//!     .with_drive(DrivePins::new(x_step, x_dir).with_end_stops(Some(x_min), None))?
//!     .with_drive(DrivePins::new(y_step, y_dir))?;
//!
//! let mut planner: MovePlanner<_> = MovePlanner::builder()
//!     .from_config(&config)?
//!     .platform(platform)
//!     .build()?;
//!
//! // One handle per context
//! let (mut background, mut step_timer) = planner.split();
//!
//! // Background loop
//! background.append(&[10.0, 20.0], 50.0, false)?;
//! background.spin()?;
//!
//! // Step timer
//! let next_ns = step_timer.interrupt()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Must come first so the logging macros are visible to every module
mod fmt;

// Core modules
pub mod config;
pub mod error;
pub mod motion;
pub mod planner;
pub mod platform;

// Re-exports for ergonomic API
pub use config::{
    validate_config, validate_kinematics, DriveConfig, DriveKind, Kinematics, MachineConfig,
    PlannerConfig,
};
pub use error::{Error, Result};
pub use motion::{Dda, Direction, MotionPhase, MovementProfile, MovementType};
pub use planner::{
    Background, CurrentState, Diagnostics, MotionRequest, MovePlanner, MovePlannerBuilder,
    MoveSource, StepTimer,
};
pub use platform::{DrivePins, EndStopHit, PinPlatform, Platform};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Millimeters, MmPerSec, MmPerSecSquared, Steps};
