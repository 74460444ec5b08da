//! Core data types for pandeps.
//!
//! This crate defines the fundamental types shared by every stage of an
//! install run: version constraints, dependencies and dependency lists,
//! resolved modules, the requirements-file line parser, and configuration.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod config;
pub mod dependency;
pub mod requirements;
pub mod version;
