//! Command implementations
//!
//! This module contains implementations for all CLI subcommands.

pub mod container;
pub mod doctor;
pub mod image;
pub mod network;
pub mod shared;
pub mod system;
pub mod volume;
pub mod watch;

use crate::cli::OutputFormat;
use berth_core::service::ResourceService;

/// State shared by every subcommand of one invocation
#[derive(Debug)]
pub struct CommandContext {
    pub output: OutputFormat,
    /// `--yes`: skip confirmation prompts
    pub assume_yes: bool,
    pub service: ResourceService,
}
