//! Command definitions for the CLI.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// List the enabled routes and what each requires.
#[derive(Debug, Args)]
pub struct RoutesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Resolve a fragment to a route without any session check.
#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// Fragment text, with or without the leading '#'
    #[arg(value_name = "FRAGMENT")]
    pub fragment: String,
}

/// Start a controller at a fragment against the stored session.
#[derive(Debug, Args)]
pub struct NavigateCommand {
    /// Fragment text, with or without the leading '#'
    #[arg(value_name = "FRAGMENT", default_value = "")]
    pub fragment: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Session subcommands.
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show the stored session
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a token and user record
    Login(LoginArgs),

    /// Remove the stored token and user record
    Logout,

    /// Remove every key from session storage
    Clear,
}

/// Arguments for `session login`.
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Login email
    #[arg(long)]
    pub email: String,

    /// Token to store
    #[arg(long, default_value = "local-token")]
    pub token: String,

    /// Account role (admin, industry, user)
    #[arg(long)]
    pub role: Option<String>,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Set the explicit administrator flag
    #[arg(long)]
    pub admin: bool,
}

/// Show the sidebar menu for the stored session.
#[derive(Debug, Args)]
pub struct MenuCommand {
    /// Page to mark active
    #[arg(long, value_name = "FRAGMENT")]
    pub current: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Replay a multi-tab script.
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// JSON-lines script, '-' for stdin
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}
