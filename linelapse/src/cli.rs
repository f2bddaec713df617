//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// linelapse - every line a file ever had, in place
#[derive(Debug, Parser)]
#[command(name = "linelapse")]
#[command(version)]
#[command(about = "Show a file's current lines interleaved with the lines its history deleted")]
#[command(long_about = None)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/linelapse/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the commits that changed a file as JSON, newest first
    #[command(alias = "log")]
    History {
        /// File inside a git working tree
        path: PathBuf,

        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Reconstruct and print the timelapse of one or more files
    Show {
        /// Files inside git working trees
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Read at most this many commits of history
        #[arg(long)]
        max_commits: Option<usize>,

        /// Context lines per diff hunk
        #[arg(long)]
        context: Option<usize>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_show_parses_flags() {
        let cli = Cli::try_parse_from([
            "linelapse", "-v", "show", "a.rs", "b.rs", "--format", "json", "--max-commits", "10",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Show { paths, format, max_commits, context, no_color } => {
                assert_eq!(paths, vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")]);
                assert_eq!(format, Format::Json);
                assert_eq!(max_commits, Some(10));
                assert_eq!(context, None);
                assert!(!no_color);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_show_requires_a_path() {
        assert!(Cli::try_parse_from(["linelapse", "show"]).is_err());
    }
}
