//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::{Colorize, control};
use serde_json::Value;
use thiserror::Error;

use binary_checker::core::config::Config;
use binary_checker::core::errors::BcError;
use binary_checker::logger::jsonl::{
    EventType, JsonlConfig, JsonlWriter, LogEntry, Severity, SharedJsonl,
};
use binary_checker::scanner::remote::{self, GitCloner, RemoteRepo};
use binary_checker::scanner::report::ScanReport;
use binary_checker::scanner::target::ScanTarget;
use binary_checker::scanner::walker::{TreeWalker, WalkerConfig};

/// binary-checker: report binary files in a source tree or compressed artifact.
#[derive(Debug, Parser)]
#[command(
    name = "binary-checker",
    author,
    version,
    about = "Report binary files in source trees and archives",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Repository URL or local path (directory or single archive) to scan.
    #[arg(value_name = "TARGET")]
    target: String,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long)]
    json: bool,
    /// Worker threads for classification and archive inspection.
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    jobs: Option<usize>,
    /// Directory that receives repository clones.
    #[arg(long, value_name = "DIR")]
    clone_dir: Option<PathBuf>,
    /// Parent directory for archive scratch directories.
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,
    /// Append scan events to this JSONL activity log.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Exit with code 4 when any binary is found.
    #[arg(long)]
    fail_on_binary: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Print a scan summary on stderr.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Suppress archive diagnostics.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Scan succeeded and `--fail-on-binary` was set.
    #[error("{0} binary finding(s) reported")]
    Findings(usize),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Findings(_) => 4,
        }
    }
}

impl From<BcError> for CliError {
    fn from(err: BcError) -> Self {
        let message = err.to_string();
        match err {
            BcError::InvalidConfig { .. }
            | BcError::MissingConfig { .. }
            | BcError::ConfigParse { .. }
            | BcError::InvalidTarget { .. } => Self::User(message),
            BcError::RootInaccessible { .. }
            | BcError::CloneFailed { .. }
            | BcError::GitNotFound { .. }
            | BcError::Io { .. }
            | BcError::Archive { .. }
            | BcError::ChannelClosed { .. }
            | BcError::Runtime { .. } => Self::Runtime(message),
            BcError::Serialization { .. } => Self::Internal(message),
        }
    }
}

/// Resolve the target, scan it and print the results.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&mut config, cli)?;

    let activity = config
        .paths
        .jsonl_log
        .as_ref()
        .map(|path| JsonlWriter::open_shared(JsonlConfig::at(path)));

    let target = resolve_target(&cli.target, &config, activity.as_ref())?;

    let mut walker = TreeWalker::new(WalkerConfig::from_config(&config.scanner));
    if let Some(log) = &activity {
        walker = walker.with_activity_log(Arc::clone(log));
    }
    let report = walker.scan(&target)?;

    emit_report(cli, output_mode(cli), &report)?;

    if cli.fail_on_binary && report.has_findings() {
        return Err(CliError::Findings(report.findings.len()));
    }
    Ok(())
}

/// CLI flags win over file and environment configuration.
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), CliError> {
    if let Some(jobs) = cli.jobs {
        config.scanner.parallelism = jobs;
    }
    if let Some(dir) = &cli.clone_dir {
        config.remote.clone_dir.clone_from(dir);
    }
    if let Some(dir) = &cli.scratch_dir {
        config.scanner.scratch_root = Some(dir.clone());
    }
    if let Some(path) = &cli.log {
        config.paths.jsonl_log = Some(path.clone());
    }
    config.validate()?;
    Ok(())
}

/// Local path as-is; repository URL through a shallow clone (or reuse).
fn resolve_target(
    input: &str,
    config: &Config,
    activity: Option<&SharedJsonl>,
) -> Result<ScanTarget, CliError> {
    if !remote::is_remote(input) {
        return Ok(ScanTarget::local(Path::new(input))?);
    }

    let repo = RemoteRepo::parse(input)?;
    let cloner = GitCloner::from_config(&config.remote);
    let fetched = match cloner.fetch(&repo, &config.remote.clone_dir) {
        Ok(fetched) => fetched,
        Err(err) => {
            log_event(
                activity,
                LogEntry::new(EventType::Error, Severity::Critical)
                    .with_path(&repo.url)
                    .with_error(&err),
            );
            return Err(err.into());
        }
    };

    let event = if fetched.reused {
        EventType::RepoReused
    } else {
        EventType::RepoCloned
    };
    log_event(
        activity,
        LogEntry::new(event, Severity::Info)
            .with_path(&fetched.path)
            .with_details(repo.url.clone()),
    );

    Ok(ScanTarget::cloned(&fetched.path, &repo.url)?)
}

fn log_event(activity: Option<&SharedJsonl>, entry: LogEntry) {
    if let Some(log) = activity {
        log.lock().write_entry(&entry);
    }
}

fn emit_report(cli: &Cli, mode: OutputMode, report: &ScanReport) -> Result<(), CliError> {
    match mode {
        OutputMode::Json => write_json_line(&report.to_json()?),
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            for finding in &report.findings {
                writeln!(stdout, "{finding}")?;
            }
            stdout.flush()?;

            let mut stderr = io::stderr().lock();
            if !cli.quiet {
                for diagnostic in &report.diagnostics {
                    writeln!(stderr, "{}", diagnostic.message.yellow())?;
                }
            }
            if cli.verbose {
                let stats = &report.stats;
                writeln!(
                    stderr,
                    "{} {} files ({} archives) in {:.1}s: {} findings, {} diagnostics, {} skipped",
                    "Scanned".bold(),
                    stats.files_seen,
                    stats.archives_inspected,
                    stats.elapsed_ms as f64 / 1000.0,
                    report.findings.len(),
                    report.diagnostics.len(),
                    stats.vanished + stats.unreadable,
                )?;
            }
            Ok(())
        }
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("BC_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

/// `--json` beats `BC_OUTPUT_FORMAT`; line output is the default so the
/// literal `Binary ... found:` lines stay stable for pipelines.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn parses_flags_before_and_after_target() {
        let before = Cli::try_parse_from([
            "binary-checker",
            "--config",
            "/tmp/bc.toml",
            "--json",
            "--no-color",
            "-v",
            "-j",
            "4",
            "./repo",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from([
            "binary-checker",
            "https://github.com/acme/widget.git",
            "--clone-dir",
            "/tmp/clones",
            "--scratch-dir",
            "/tmp/scratch",
            "--log",
            "/tmp/bc.jsonl",
            "--fail-on-binary",
            "-q",
        ]);
        assert!(after.is_ok());
    }

    #[test]
    fn target_is_required() {
        assert!(Cli::try_parse_from(["binary-checker"]).is_err());
        assert!(Cli::try_parse_from(["binary-checker", "--json"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["binary-checker", "-v", "-q", "."]).is_err());
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("json")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some(" JSON ")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human")), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("auto")), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None), OutputMode::Human);
    }

    #[test]
    fn exit_codes_follow_contract() {
        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 2);
        assert_eq!(CliError::Internal(String::new()).exit_code(), 3);
        assert_eq!(CliError::Findings(2).exit_code(), 4);
    }

    #[test]
    fn library_errors_map_to_exit_classes() {
        let missing = CliError::from(BcError::MissingConfig {
            path: PathBuf::from("/nope.toml"),
        });
        assert_eq!(missing.exit_code(), 1);

        let root = CliError::from(BcError::RootInaccessible {
            path: PathBuf::from("/nope"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(root.exit_code(), 2);
        assert!(root.to_string().starts_with("[BC-2002]"));

        let clone = CliError::from(BcError::CloneFailed {
            url: "https://example.org/a.git".to_string(),
            details: "exit 128".to_string(),
        });
        assert_eq!(clone.exit_code(), 2);
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "binary-checker",
            "-j",
            "3",
            "--clone-dir",
            "/tmp/clones",
            "--scratch-dir",
            "/tmp/scratch",
            "--log",
            "/tmp/bc.jsonl",
            ".",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli).unwrap();

        assert_eq!(config.scanner.parallelism, 3);
        assert_eq!(config.remote.clone_dir, PathBuf::from("/tmp/clones"));
        assert_eq!(
            config.scanner.scratch_root,
            Some(PathBuf::from("/tmp/scratch"))
        );
        assert_eq!(config.paths.jsonl_log, Some(PathBuf::from("/tmp/bc.jsonl")));
    }

    #[test]
    fn zero_jobs_is_a_user_error() {
        let cli = parse(&["binary-checker", "-j", "0", "."]);
        let err = apply_overrides(&mut Config::default(), &cli).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn excessive_jobs_is_a_user_error() {
        let cli = parse(&["binary-checker", "-j", "100000", "."]);
        let err = apply_overrides(&mut Config::default(), &cli).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("BC-1001"));
    }

    #[test]
    fn missing_local_target_is_runtime_error() {
        let err = resolve_target("/nonexistent/bc/target", &Config::default(), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn malformed_url_is_user_error() {
        let err = resolve_target("https://github.com/", &Config::default(), None).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
