//! Shared utilities for pandeps.
//!
//! This crate provides cross-cutting concerns used by all other pandeps crates:
//! error types, filesystem helpers, process spawning, and terminal progress
//! indicators.

pub mod errors;
pub mod fs;
pub mod process;
pub mod progress;
