//! Logging configuration for hawa-nav.
//!
//! Sets up the tracing subscriber used by the `hawanav` binary. The library
//! itself only emits events; it never installs a subscriber on its own.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Redirects and startup only (info and above).
    #[default]
    Normal,
    /// Every transition (debug and above).
    Verbose,
    /// Every event and session read (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// The filter directive used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(verbosity: Verbosity) -> String {
    format!("hawa_nav={}", verbosity.to_level_filter())
}

/// Install the `hawanav` subscriber, writing to stderr.
///
/// `RUST_LOG` replaces [`default_directive`] when set. A second call is a
/// no-op.
///
/// ```no_run
/// use hawa_nav::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    // stdout carries `--json` output.
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

/// Route warnings from unit tests through the libtest capture.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hawa_nav=warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_quiet_directive_keeps_errors() {
        assert_eq!(default_directive(Verbosity::Quiet), "hawa_nav=ERROR");
        assert_eq!(default_directive(Verbosity::default()), "hawa_nav=INFO");
    }

    #[test]
    fn test_default_directive_parses() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(default_directive(verbosity)).is_ok());
        }
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_test_logging();
        init_logging(Verbosity::Trace);
        init_logging(Verbosity::Quiet);
    }
}
