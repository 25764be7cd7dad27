//! Command-line interface for hawa-nav.
//!
//! This module provides the CLI structure for the `hawanav` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, LoginArgs, MenuCommand, NavigateCommand, ReplayCommand, ResolveCommand,
    RoutesCommand, SessionCommand,
};

use crate::logging::Verbosity;

/// hawanav - Inspect and exercise the Hawa dashboard router
///
/// Resolves fragments, applies the access policy against a stored session,
/// and replays multi-tab navigation scripts.
#[derive(Debug, Parser)]
#[command(name = "hawanav")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List enabled routes and their access levels
    Routes(RoutesCommand),

    /// Resolve a fragment to a route
    Resolve(ResolveCommand),

    /// Decide which page a fragment shows for the stored session
    Navigate(NavigateCommand),

    /// Inspect or change the stored session
    #[command(subcommand)]
    Session(SessionCommand),

    /// Show the sidebar menu for the stored session
    Menu(MenuCommand),

    /// Replay a multi-tab navigation script
    Replay(ReplayCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
