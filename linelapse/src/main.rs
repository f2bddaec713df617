//! linelapse: every line a file ever had, shown where it used to be.
//!
//! Entry point for the `linelapse` binary. Wires together the command line
//! (`cli`), the process-scoped configuration (`config`), the git collaborators
//! (`git`) and the output formats (`render`) around `linelapse-core`.
//!
//! # Startup sequence
//!
//! 1. Parse arguments, then load config from `--config` or the XDG path.
//!    Config problems are soft failures printed to stderr.
//! 2. Install the tracing subscriber on stderr so stdout stays parseable.
//! 3. Run the command. `show` reconstructs each file on tokio's blocking
//!    pool; git2 work never runs on the async workers.
//!
//! Exit status is 0 on success, 2 when a path cannot be reconstructed because
//! of what was asked for (missing file, no repository, untracked file), and 1
//! for every other failure.

mod cli;
mod config;
mod git;
mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use linelapse_core::{
    reconstruct, BuildOptions, Commit, CommitStream, HistorySource, Timelapse, TimelapseError,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, Format};
use config::Config;
use git::GitRepo;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    init_tracing(cli.verbose, &config.log.filter);

    if std::env::var_os("NO_COLOR").is_some() || !config.render.color {
        colored::control::set_override(false);
    }

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            exit_code(&e)
        }
    }
}

/// `--verbose` forces debug output; otherwise `RUST_LOG` wins over the
/// configured filter.
fn init_tracing(verbose: bool, configured: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// How a run ended, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Success,
    /// The request named something that cannot be reconstructed.
    InputError,
    Failure,
}

impl Outcome {
    fn of(e: &anyhow::Error) -> Self {
        match e.downcast_ref::<TimelapseError>() {
            Some(err) if err.is_input_error() => Outcome::InputError,
            _ => Outcome::Failure,
        }
    }

    /// The worst outcome among `errors`: any non-input failure wins over
    /// input errors, and no errors at all is a success.
    fn fold<'a>(errors: impl IntoIterator<Item = &'a anyhow::Error>) -> Self {
        errors.into_iter().map(Outcome::of).max().unwrap_or(Outcome::Success)
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::InputError => ExitCode::from(2),
            Outcome::Failure => ExitCode::FAILURE,
        }
    }
}

fn exit_code(e: &anyhow::Error) -> ExitCode {
    Outcome::of(e).into()
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::History { path, limit } => {
            let commits = tokio::task::spawn_blocking(move || file_history(&path, limit)).await??;
            println!("{}", serde_json::to_string_pretty(&commits)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { paths, format, max_commits, context, no_color } => {
            if no_color {
                colored::control::set_override(false);
            }
            let options = BuildOptions { max_commits: max_commits.or(config.history.max_commits) };
            let context = context.unwrap_or(config.diff.context_lines);
            let results = show_all(paths, context, options).await;
            let style = render::TextStyle {
                color: colored::control::SHOULD_COLORIZE.should_colorize(),
                line_numbers: config.render.line_numbers,
            };
            Ok(print_results(&results, format, style)?)
        }
    }
}

/// Commits that changed `path`, newest first, at most `limit` of them.
fn file_history(path: &Path, limit: Option<usize>) -> anyhow::Result<Vec<Commit>> {
    let (repo, relative) = GitRepo::open(path)?;
    let mut stream = repo.history(&relative)?;
    let mut commits = Vec::new();
    while limit.is_none_or(|max| commits.len() < max) {
        let Some(item) = stream.next() else {
            break;
        };
        commits.push(item.with_context(|| format!("reading history of {}", path.display()))?);
    }
    stream.stop();
    debug!(path = %relative, commits = commits.len(), "history listed");
    Ok(commits)
}

fn reconstruct_file(path: &Path, context: usize, options: &BuildOptions) -> anyhow::Result<Timelapse> {
    let (repo, relative) = GitRepo::open(path)?;
    let repo = repo.with_context_lines(context);
    let timelapse = reconstruct(&repo, &relative, options)
        .with_context(|| format!("reconstructing {}", path.display()))?;
    info!(
        path = %relative,
        segments = timelapse.len(),
        deleted = timelapse.deleted_line_count(),
        "reconstructed"
    );
    Ok(timelapse)
}

/// Reconstructs every path concurrently; results keep argument order.
async fn show_all(
    paths: Vec<PathBuf>,
    context: usize,
    options: BuildOptions,
) -> Vec<(PathBuf, anyhow::Result<Timelapse>)> {
    let tasks = paths.into_iter().map(|path| {
        let options = options.clone();
        async move {
            let task_path = path.clone();
            let joined = tokio::task::spawn_blocking(move || {
                reconstruct_file(&task_path, context, &options)
            })
            .await;
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(anyhow::Error::new(e).context("reconstruction task failed")),
            };
            (path, result)
        }
    });
    futures::future::join_all(tasks).await
}

/// Prints each result and folds failures into one exit status: 1 if any
/// failure was not an input error, else 2 if any file failed, else 0.
fn print_results(
    results: &[(PathBuf, anyhow::Result<Timelapse>)],
    format: Format,
    style: render::TextStyle,
) -> anyhow::Result<ExitCode> {
    let mut json = Vec::new();

    for (path, result) in results {
        let shown = path.display().to_string();
        match result {
            Ok(timelapse) => match format {
                Format::Text => print!("{}", render::text(&shown, timelapse, style)),
                Format::Json => json.push(serde_json::to_value(render::Report::new(&shown, timelapse))?),
            },
            Err(e) => {
                eprintln!("{}: {:#}", "error".red().bold(), e);
                if format == Format::Json {
                    json.push(serde_json::to_value(render::Failure { path: &shown, error: format!("{e:#}") })?);
                }
            }
        }
    }

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    let errors = results.iter().filter_map(|(_, result)| result.as_ref().err());
    Ok(Outcome::fold(errors).into())
}
