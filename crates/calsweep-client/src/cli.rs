//! Command-line interface definition.

use std::path::PathBuf;

use calsweep_core::TracingOutputFormat;
use clap::{Parser, Subcommand};

/// calsweep - bulk recolor, delete and copy of calendar events
///
/// Without flags, events in [START, END) are recolored by the configured
/// color rules. Dates are read in the configured time zone when they carry
/// no offset.
#[derive(Debug, Parser)]
#[command(name = "calsweep")]
#[command(author, version, about, long_about = None)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    /// Start of the window (inclusive), e.g. 2025-09-01 or 2025-09-01T09:00:00+02:00
    #[arg(value_name = "START", required = true)]
    pub start: Option<String>,

    /// End of the window (exclusive)
    #[arg(value_name = "END", required = true)]
    pub end: Option<String>,

    /// Delete events matching the delete rules instead of recoloring
    #[arg(long, conflicts_with = "copy_to")]
    pub delete: bool,

    /// Copy every event of the window so that the copy starts at DATE
    #[arg(long = "copy-to", visible_alias = "copyTo", value_name = "DATE")]
    pub copy_to: Option<String>,

    /// Path to configuration file
    #[arg(long, short, env = "CALSWEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log line format (compact, pretty, json)
    #[arg(long, value_name = "FORMAT", default_value = "compact", global = true)]
    pub log_format: TracingOutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What a run without subcommand does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Recolor,
    Delete,
    Copy { target: String },
}

impl Cli {
    /// Returns the bulk operation selected by the flags.
    pub fn mode(&self) -> Mode {
        match (&self.copy_to, self.delete) {
            (Some(target), _) => Mode::Copy {
                target: target.clone(),
            },
            (None, true) => Mode::Delete,
            (None, false) => Mode::Recolor,
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication providers.
#[derive(Debug, Subcommand)]
pub enum AuthProvider {
    /// Authorize calsweep to read and modify your Google Calendar
    #[cfg(feature = "google")]
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to the OAuth client JSON downloaded from Google Cloud Console
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Authorize again even if tokens are already stored
        #[arg(long, short)]
        force: bool,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration, including rules and time zone
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("calsweep").chain(args.iter().copied()))
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn window_alone_recolors() {
        let cli = parse(&["2025-09-01", "2025-09-14"]).unwrap();
        assert_eq!(cli.start.as_deref(), Some("2025-09-01"));
        assert_eq!(cli.end.as_deref(), Some("2025-09-14"));
        assert_eq!(cli.mode(), Mode::Recolor);
        assert_eq!(cli.log_format, TracingOutputFormat::Compact);
    }

    #[test]
    fn delete_flag_selects_delete() {
        let cli = parse(&["2025-09-01", "2025-09-14", "--delete"]).unwrap();
        assert_eq!(cli.mode(), Mode::Delete);
    }

    #[test]
    fn copy_accepts_both_spellings() {
        for flag in ["--copy-to", "--copyTo"] {
            let cli = parse(&["2025-09-01", "2025-09-08", flag, "2025-09-08"]).unwrap();
            assert_eq!(
                cli.mode(),
                Mode::Copy {
                    target: "2025-09-08".to_string()
                }
            );
        }
    }

    #[test]
    fn delete_and_copy_conflict() {
        let err = parse(&["2025-09-01", "2025-09-08", "--delete", "--copy-to", "2025-09-08"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn window_is_required_without_subcommand() {
        let err = parse(&["2025-09-01"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn subcommands_do_not_need_a_window() {
        let cli = parse(&["config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Path
            })
        ));
        assert!(cli.start.is_none());
    }

    #[test]
    fn log_format_is_parsed() {
        let cli = parse(&["--log-format", "json", "2025-09-01", "2025-09-02"]).unwrap();
        assert_eq!(cli.log_format, TracingOutputFormat::Json);
        assert!(parse(&["--log-format", "xml", "2025-09-01", "2025-09-02"]).is_err());
    }
}
