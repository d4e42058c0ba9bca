//! jqq - interactive jq console
//!
//! jqq keeps a jq expression on an edit line and shows what it produces for
//! a fixed document underneath. Press Enter to re-run the expression.
//!
//! # Quick Start
//!
//! ```text
//! jqq '.items[] | .name' data.json
//! ```
//!
//! On exit jqq prints the command line that reopens it in the same state.
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Evaluate the expression |
//! | Left/Right | Move the cursor |
//! | Ctrl+A / Home | Start of line |
//! | Ctrl+E / End | End of line |
//! | Backspace | Delete before the cursor |
//! | Ctrl+K | Delete to end of line |
//! | Ctrl+U | Clear the line |
//! | Ctrl+D / Ctrl+C | Quit |

mod config;
mod controller;
mod core;
mod ui;

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{Config, ConfigError};
use crate::controller::{Console, Controller};
use crate::core::eval::ProcessEvaluator;
use crate::core::session::{Session, SessionOutcome};
use crate::ui::{Screen, TerminalConsole, TerminalGuard};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name used in usage text and the replay command
const PROGRAM: &str = "jqq";

/// Arguments of an interactive session
#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    expression: String,
    document: PathBuf,
}

/// What to do after looking at the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Preflight {
    Run(CliArgs),
    Version,
    Help,
    Usage,
    MissingEvaluator,
}

fn print_version() {
    eprintln!("{} Version {}", PROGRAM, VERSION);
}

fn print_usage() {
    eprintln!("Usage: {} <expr> <file>", PROGRAM);
}

fn print_help() {
    print_usage();
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Enter                 Evaluate the expression");
    eprintln!("  Left/Right            Move the cursor");
    eprintln!("  Ctrl+A, Home          Start of line");
    eprintln!("  Ctrl+E, End           End of line");
    eprintln!("  Backspace             Delete before the cursor");
    eprintln!("  Ctrl+K                Delete to end of line");
    eprintln!("  Ctrl+U                Clear the line");
    eprintln!("  Ctrl+D, Ctrl+C        Quit");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  --version             Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.jqq/config.toml");
    eprintln!("Log file:      ~/.jqq/jqq.log (filter with JQQ_LOG)");
}

/// Check the command line before touching the terminal
fn preflight(args: &[String], evaluator_found: impl FnOnce() -> bool) -> Preflight {
    if args.iter().any(|a| a == "--version") {
        return Preflight::Version;
    }
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Preflight::Help;
    }
    if args.len() < 2 {
        return Preflight::Usage;
    }
    if !evaluator_found() {
        return Preflight::MissingEvaluator;
    }

    // The last argument has to be a regular file
    let last = Path::new(&args[args.len() - 1]);
    if !last.is_file() {
        return Preflight::Usage;
    }

    Preflight::Run(CliArgs {
        expression: args[0].clone(),
        document: PathBuf::from(&args[1]),
    })
}

/// Look `program` up the way a shell would
fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Initialize logging to `~/.jqq/jqq.log`
fn init_logging(config: &Config) {
    let log_path = config::data_dir()
        .map(|dir| dir.join("jqq.log"))
        .unwrap_or_else(|| PathBuf::from("jqq.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("JQQ_LOG")
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let (config, config_error): (Config, Option<ConfigError>) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let cli = match preflight(&args, || find_in_path(&config.evaluator).is_some()) {
        Preflight::Run(cli) => cli,
        Preflight::Version => {
            print_version();
            std::process::exit(0);
        }
        Preflight::Help => {
            print_help();
            std::process::exit(0);
        }
        Preflight::Usage => {
            print_usage();
            std::process::exit(1);
        }
        Preflight::MissingEvaluator => {
            eprintln!("{} not found in $PATH", config.evaluator);
            print_usage();
            std::process::exit(1);
        }
    };

    init_logging(&config);
    if let Some(e) = config_error {
        warn!("Using default configuration: {}", e);
    }
    info!("jqq {} starting with evaluator {}", VERSION, config.evaluator);

    let outcome = run_interactive(cli, &config)?;
    println!("{}", outcome.replay_command(PROGRAM));
    Ok(())
}

/// Run the editing loop inside raw mode and the alternate screen
fn run_interactive(cli: CliArgs, config: &Config) -> anyhow::Result<SessionOutcome> {
    let mut guard = TerminalGuard::enter().context("Failed to initialize terminal")?;

    let console = TerminalConsole::new();
    let (rows, cols) = console.size()?;
    info!("Terminal size: {}x{}", cols, rows);

    let screen = Screen::new(io::stdout(), rows, cols, config.colors.to_screen_colors());
    let evaluator = ProcessEvaluator::new(config.evaluator.clone(), config.evaluator_args.clone());
    let session = Session::new(&cli.expression, cli.document);

    let result = Controller::new(session, console, evaluator, screen, config.max_lines).run();

    // Restore before anything is printed to the normal screen
    guard.restore()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_version_wins() {
        assert_eq!(preflight(&args(&["--version"]), || false), Preflight::Version);
        assert_eq!(preflight(&args(&[".", "missing.json", "--version"]), || false), Preflight::Version);
    }

    #[test]
    fn test_too_few_arguments() {
        assert_eq!(preflight(&args(&[]), || true), Preflight::Usage);
        assert_eq!(preflight(&args(&["."]), || true), Preflight::Usage);
    }

    #[test]
    fn test_missing_evaluator_before_file_check() {
        assert_eq!(
            preflight(&args(&[".", "missing.json"]), || false),
            Preflight::MissingEvaluator
        );
    }

    #[test]
    fn test_document_must_be_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_string_lossy().into_owned();
        assert_eq!(preflight(&args(&[".", &dir_arg]), || true), Preflight::Usage);

        let missing = dir.path().join("missing.json").to_string_lossy().into_owned();
        assert_eq!(preflight(&args(&[".", &missing]), || true), Preflight::Usage);
    }

    #[test]
    fn test_run() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().into_owned();
        assert_eq!(
            preflight(&args(&[".a", &path]), || true),
            Preflight::Run(CliArgs {
                expression: ".a".to_string(),
                document: PathBuf::from(&path),
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_find_in_path() {
        assert!(find_in_path("sh").is_some());
        assert!(find_in_path("/bin/sh").is_some());
        assert!(find_in_path("jqq-test-no-such-program").is_none());
    }
}
