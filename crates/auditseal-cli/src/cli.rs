//! CLI argument definitions using clap derive macros.

use std::io::Write;

use auditseal_common_log::{LogConfig, LogFormat, LogLevel};
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{InspectCommand, VerifyCommand};
use crate::output::{write_output, OutputFormat};
use crate::Exit;

/// AuditSeal - offline verification of hardened audit packages
///
/// Everything is re-derived from the archive itself; no network access or
/// database is needed.
#[derive(Debug, Parser)]
#[command(
    name = "auditseal",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true, env = "AUDITSEAL_JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify hashes, Merkle root, signature and timestamp of a package
    Verify(VerifyCommand),

    /// Print the manifest summary of a package
    Inspect(InspectCommand),
}

impl Cli {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    /// Logging goes to stderr so stdout stays parseable.
    pub fn log_config(&self) -> LogConfig {
        let level = match self.verbose {
            0 if self.quiet => LogLevel::Error,
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
        LogConfig {
            level,
            format: LogFormat::Compact,
            ..LogConfig::default()
        }
    }

    /// Run the selected command, writing its report to `out`.
    pub fn execute<W: Write + ?Sized>(&self, out: &mut W) -> anyhow::Result<Exit> {
        match &self.command {
            Command::Verify(cmd) => {
                let report = cmd.run()?;
                write_output(self.format(), &report, out)?;
                Ok(if report.is_valid {
                    Exit::Valid
                } else {
                    Exit::Invalid
                })
            }
            Command::Inspect(cmd) => {
                let summary = cmd.run()?;
                write_output(self.format(), &summary, out)?;
                Ok(Exit::Valid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_log_level() {
        let quiet = Cli::try_parse_from(["auditseal", "-q", "inspect", "p.zip"]).unwrap();
        assert_eq!(quiet.log_config().level, LogLevel::Error);

        let chatty = Cli::try_parse_from(["auditseal", "-vv", "verify", "p.zip"]).unwrap();
        assert_eq!(chatty.log_config().level, LogLevel::Debug);
        assert_eq!(chatty.format(), OutputFormat::Text);
    }

    #[test]
    fn test_json_flag_is_global() {
        let cli = Cli::try_parse_from(["auditseal", "verify", "p.zip", "--json"]).unwrap();
        assert_eq!(cli.format(), OutputFormat::Json);
        assert!(matches!(cli.command, Command::Verify(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["auditseal", "-q", "-v", "verify", "p.zip"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
