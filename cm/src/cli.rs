//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::handler::catalog::DEFAULT_HANDLER;

/// careermesh - scatter-gather career advice handlers
#[derive(Parser)]
#[command(
    name = "cm",
    about = "Ask a mesh of career-advice handlers that consult each other",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Spawn the mesh, ask one handler and print its reply
    Ask {
        /// Handler to ask (see `cm handlers`)
        #[arg(short = 'H', long, default_value = DEFAULT_HANDLER)]
        handler: String,

        /// The question, e.g. "data engineer roles in Pune"
        query: String,
    },

    /// Show which collaborators a handler would consult for a query
    Route {
        /// Handler whose router to run
        #[arg(short = 'H', long)]
        handler: String,

        query: String,
    },

    /// List the built-in handlers
    Handlers {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for listing commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_defaults_to_job_matching() {
        let cli = Cli::try_parse_from(["cm", "ask", "data engineer roles"]).unwrap();
        match cli.command {
            Command::Ask { handler, query } => {
                assert_eq!(handler, "job-matching");
                assert_eq!(query, "data engineer roles");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_route_requires_handler() {
        assert!(Cli::try_parse_from(["cm", "route", "python"]).is_err());
        let cli = Cli::try_parse_from(["cm", "-l", "debug", "route", "-H", "skill-assessment", "python"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Route { ref handler, .. } if handler == "skill-assessment"));
    }

    #[test]
    fn test_handlers_format() {
        let cli = Cli::try_parse_from(["cm", "handlers", "--format", "JSON"]).unwrap();
        assert!(matches!(cli.command, Command::Handlers { format: OutputFormat::Json }));
        assert!(Cli::try_parse_from(["cm", "handlers", "--format", "yaml"]).is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["cm", "handlers", "-c", "/tmp/cm.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cm.yml")));
    }
}
