//! Cadre Kernel Library
//!
//! Plugin discovery, dependency resolution, policy gating, registration, and
//! hot reload for the cadre host. The `cadre` binary is a thin front end
//! over this crate.

pub mod cli;
pub mod config;
pub mod plugin;
