//! jobcheck - CI job definition conformance checker
//!
//! ## Commands
//!
//! - `list`: Show the jobs a file defines, optionally filtered by repository
//! - `verify`: Check a job file against an expectation suite

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jobcheck_core::{load, load_suite, select_by_repository, verify, JobDocument, SuiteReport};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "jobcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check CI job definitions against declarative expectations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "JOBCHECK_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the jobs defined in a job file
    List {
        /// Job definition file (YAML)
        file: PathBuf,

        /// Only show jobs owned by this repository (org/repo); repeatable
        #[arg(short, long = "repo")]
        repos: Vec<String>,
    },

    /// Verify a job file against an expectation suite
    Verify {
        /// Job definition file (YAML)
        file: PathBuf,

        /// Expectation suite (YAML)
        #[arg(short, long, env = "JOBCHECK_SUITE")]
        suite: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    jobcheck_core::init_tracing(cli.json, level);

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::List { file, repos } => cmd_list(&mut stdout, &file, &repos),
        Commands::Verify {
            file,
            suite,
            format,
        } => {
            let passed = cmd_verify(&mut stdout, &file, &suite, format)?;
            if !passed {
                stdout.flush().ok();
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn load_document(file: &Path) -> Result<JobDocument> {
    load(file).with_context(|| format!("Failed to load job file {}", file.display()))
}

/// Print `kind repository name` for each matched job
fn cmd_list(out: &mut impl Write, file: &Path, repos: &[String]) -> Result<()> {
    let document = load_document(file)?;

    let entries = if repos.is_empty() {
        document.entries().collect::<Vec<_>>()
    } else {
        select_by_repository(&document, repos)
    };
    debug!(matched = entries.len(), "listing jobs");

    if entries.is_empty() {
        writeln!(out, "No matching jobs.")?;
        return Ok(());
    }
    for entry in entries {
        writeln!(out, "{:<10} {:<32} {}", entry.kind, entry.repository, entry.job.name)?;
    }
    Ok(())
}

/// Verify a job file and print the report. Returns whether the suite passed.
fn cmd_verify(out: &mut impl Write, file: &Path, suite_path: &Path, format: ReportFormat) -> Result<bool> {
    let document = load_document(file)?;
    let suite = load_suite(suite_path)
        .with_context(|| format!("Failed to load expectation suite {}", suite_path.display()))?;

    let report = verify(&suite, &document);
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report).context("Failed to encode report")?;
            writeln!(out)?;
        }
        ReportFormat::Text => print_report(out, &report)?,
    }
    Ok(report.passed)
}

fn print_report(out: &mut impl Write, report: &SuiteReport) -> Result<()> {
    writeln!(out, "Job file: {}", report.source.display())?;
    writeln!(out, "Digest:   {}", report.document_digest)?;
    writeln!(out)?;

    for violation in &report.count_violations {
        writeln!(out, "  ✗ count {violation}")?;
    }
    for outcome in &report.outcomes {
        let status = if outcome.passed() { "✓" } else { "✗" };
        writeln!(out, "  {} {} {}", status, outcome.kind, outcome.name)?;
        if !outcome.found() {
            writeln!(out, "      job not found")?;
        }
        for violation in &outcome.violations {
            writeln!(out, "      {violation}")?;
        }
    }

    writeln!(out)?;
    if report.passed {
        writeln!(out, "Status: ✓ PASSED")?;
    } else {
        writeln!(
            out,
            "Status: ✗ FAILED ({} violation(s))",
            report.violation_count()
        )?;
    }
    Ok(())
}
