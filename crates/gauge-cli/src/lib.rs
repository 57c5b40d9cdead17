//! Gas cylinder level tracker CLI library.
//!
//! This crate provides the CLI interface for the tracker.

mod cli;
pub mod commands;
mod config;
mod services;

pub use cli::{Cli, Commands, CylinderAction};
pub use config::Config;
pub use services::Services;
