use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use gitdora_core::{DoraConfig, OutputFormat};
use gitdora_metrics::pipeline::{analyze, DoraReport};
use gitdora_metrics::render::Section;
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_FILE: &str = ".gitdora.toml";

#[derive(Parser)]
#[command(
    name = "gitdora",
    version,
    about = "DORA delivery metrics from git history",
    long_about = "gitdora computes delivery metrics from a textual git history.\n\n\
                   Feed it `git log` output and it reports cycle time between commits,\n\
                   cycle time by branch (reconstructed from merge topology), change\n\
                   failure rate, monthly throughput and per-author activity.\n\n\
                   Examples:\n  \
                     git log --parents --decorate --date=iso-strict | gitdora report\n  \
                     gitdora cycle-time --input history.log --format json\n  \
                     gitdora branches --input history.log\n  \
                     gitdora failures --input history.log --format markdown\n  \
                     gitdora init                        Write a default .gitdora.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .gitdora.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Cycle time between consecutive commits of each author
    #[command(long_about = "Cycle time between consecutive commits of each author.\n\n\
        Deltas are bucketed by [cycle_time] bucket_size x period, folded into sliding\n\
        windows of window_size buckets, and normalized by calendar month (minutes).\n\n\
        Examples:\n  git log --date=iso-strict | gitdora cycle-time\n  gitdora cycle-time --input history.log")]
    CycleTime {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Cycle time of merged branches, by merge week
    #[command(long_about = "Cycle time of merged branches, pooled by merge week.\n\n\
        Branches are reconstructed from merge topology, so deleted branch refs still\n\
        count. Reports cycle, work and QA time in days, plus unmerged branches.\n\
        Parent hashes are required: use `git log --parents`.\n\n\
        Example:\n  git log --parents --decorate --date=iso-strict | gitdora branches")]
    Branches {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Monthly change failure rate
    #[command(long_about = "Monthly change failure rate.\n\n\
        A commit counts as a failure fix when its subject contains one of the\n\
        [change_failure] keywords (case-insensitive substring).\n\n\
        Example:\n  gitdora failures --input history.log --format markdown")]
    Failures {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Monthly commits and active authors
    Throughput {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Weekly commits per author and percentile rank by total commits
    #[command(long_about = "Weekly commits per author and percentile rank by total commits.\n\n\
        Authors are keyed by email (case-insensitive) when present, otherwise by name.\n\
        An author's percentile is the share of authors with as many commits or fewer.\n\n\
        Example:\n  gitdora authors --input history.log --format json")]
    Authors {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// All metrics in one report
    Report {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Create a default .gitdora.toml configuration file
    #[command(long_about = "Create a default .gitdora.toml configuration file.\n\n\
        Writes every option with its default value.\n\
        Fails if .gitdora.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Which part of the report a subcommand prints.
#[derive(Clone, Copy)]
enum Selection {
    CycleTime,
    Branches,
    Failures,
    Throughput,
    Authors,
    All,
}

const DEFAULT_CONFIG: &str = r#"# gitdora configuration

[cycle_time]
# Base period of a bucket: "day" or "week"
period = "week"
# Periods per bucket
bucket_size = 4
# Buckets folded into one sliding window
window_size = 1

[change_failure]
# Case-insensitive substrings that mark a subject as a failure fix
keywords = ["revert", "hotfix", "bugfix", "bug", "fix", "problem", "issue"]

[branches]
# Candidate trunk names, in priority order; "<remote>/<name>" also matches
trunk = ["main", "master", "trunk", "develop"]
"#;

fn read_log_input(input: &Option<PathBuf>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(text)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DoraConfig> {
    let config = match path {
        Some(path) => DoraConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                DoraConfig::from_file(default_path)?
            } else {
                DoraConfig::default()
            }
        }
    };
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_analysis(
    input: &Option<PathBuf>,
    config: &DoraConfig,
    format: OutputFormat,
    selection: Selection,
) -> Result<()> {
    let text = read_log_input(input)?;
    let report = analyze(&text, config)?;
    eprintln!(
        "Ingested {} commits ({} rejected, {} boundary parents).",
        report.valid, report.rejected, report.boundary_parents
    );
    print_report(&report, format, selection)
}

fn print_report(report: &DoraReport, format: OutputFormat, selection: Selection) -> Result<()> {
    let section = match selection {
        Selection::CycleTime => Section::CycleTime(&report.cycle_time),
        Selection::Branches => Section::Branches(&report.branches),
        Selection::Failures => Section::Failures(&report.failures),
        Selection::Throughput => Section::Throughput(&report.throughput),
        Selection::Authors => Section::Authors(&report.authors),
        Selection::All => {
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", report.to_markdown()),
                OutputFormat::Text => print!("{report}"),
            }
            return Ok(());
        }
    };

    match format {
        OutputFormat::Json => {
            let json = match section {
                Section::CycleTime(cycle) => serde_json::to_string_pretty(cycle),
                Section::Branches(branches) => serde_json::to_string_pretty(branches),
                Section::Failures(rows) => serde_json::to_string_pretty(rows),
                Section::Throughput(rows) => serde_json::to_string_pretty(rows),
                Section::Authors(rows) => serde_json::to_string_pretty(rows),
            };
            println!("{}", json.into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", section.to_markdown()),
        OutputFormat::Text => print!("{section}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, ?config, "configuration loaded");

    match cli.command {
        Command::CycleTime { ref input } => {
            run_analysis(input, &config, cli.format, Selection::CycleTime)?;
        }
        Command::Branches { ref input } => {
            run_analysis(input, &config, cli.format, Selection::Branches)?;
        }
        Command::Failures { ref input } => {
            run_analysis(input, &config, cli.format, Selection::Failures)?;
        }
        Command::Throughput { ref input } => {
            run_analysis(input, &config, cli.format, Selection::Throughput)?;
        }
        Command::Authors { ref input } => {
            run_analysis(input, &config, cli.format, Selection::Authors)?;
        }
        Command::Report { ref input } => {
            run_analysis(input, &config, cli.format, Selection::All)?;
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{} already exists", CONFIG_FILE);
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "gitdora", &mut std::io::stdout());
        }
    }

    Ok(())
}
