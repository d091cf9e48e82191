//! Unit test harness for step-planner.
//!
//! This module organizes configuration tests that go through the public API.

mod config_parsing;
mod config_validation;
