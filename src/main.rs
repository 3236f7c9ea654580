//! wfref CLI - workflow spec resolution and distribution

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use wfref::compiler::CommandCompiler;
use wfref::repo_context::GitCurrentRepository;
use wfref::spec::parse_workflow_spec_with;
use wfref::{
    default_remote, parse_repo_spec, ContentFetcher, FixSuggestion, ImportCollector, VersionResolver,
    WfrefConfig, WfrefError,
};

#[derive(Parser)]
#[command(name = "wfref")]
#[command(about = "Resolve, fetch and bundle agentic workflow specs")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/wfref/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a workflow spec and print its parts
    Parse {
        /// owner/repo/name[@ref], owner/repo/path.md[@ref], GitHub URL or ./path.md
        spec: String,

        /// Parse as a repository spec (owner/repo[@ref])
        #[arg(long)]
        repo: bool,
    },

    /// Resolve a repository spec to a concrete ref
    Resolve {
        /// owner/repo[@ref] or repository URL
        spec: String,

        /// Allow moving to a new major release
        #[arg(long)]
        allow_major: bool,
    },

    /// Download the workflow a spec names
    Fetch {
        spec: String,

        /// Write to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Allow moving to a new major release
        #[arg(long)]
        allow_major: bool,
    },

    /// List the local files a workflow (or a directory of workflows) needs
    Collect {
        /// Workflow .md file or workflows directory
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        match e.downcast_ref::<WfrefError>() {
            // Crate errors already embed their source in the message
            Some(err) => {
                eprintln!("{} {}", "Error:".red().bold(), err);
                if let Some(suggestion) = err.fix_suggestion() {
                    eprintln!("  {} {}", "Fix:".yellow(), suggestion);
                }
            }
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { spec, repo } => parse(&config, &spec, repo),
        Commands::Resolve { spec, allow_major } => resolve(&config, &spec, allow_major),
        Commands::Fetch {
            spec,
            output,
            allow_major,
        } => fetch(&config, &spec, output.as_deref(), allow_major),
        Commands::Collect { path } => collect(&config, &path),
    }
}

fn load_config(path: Option<&Path>) -> Result<WfrefConfig, WfrefError> {
    let config = match path {
        Some(p) => WfrefConfig::load_from(p)?,
        None => WfrefConfig::load()?,
    };
    config.with_env()
}

fn parse(config: &WfrefConfig, input: &str, repo_only: bool) -> anyhow::Result<()> {
    if repo_only {
        let spec = parse_repo_spec(input)?;
        println!("repo:    {}", spec.repo_slug());
        println!("version: {}", spec.version());
        return Ok(());
    }

    let current = GitCurrentRepository::new()
        .with_git(config.tools.git.clone())
        .with_timeout(config.timeouts.git());
    let spec = parse_workflow_spec_with(input, &current)?;
    println!("repo:    {}", spec.repo_slug());
    println!("version: {}", spec.version());
    println!("path:    {}", spec.workflow_path());
    println!("name:    {}", spec.workflow_name());
    if let Some(source) = spec.build_source_string() {
        println!("source:  {}", source);
    }
    Ok(())
}

fn resolve(config: &WfrefConfig, input: &str, allow_major: bool) -> anyhow::Result<()> {
    let spec = parse_repo_spec(input)?;
    let remote = default_remote(config);
    let resolved = VersionResolver::new(&remote).resolve(&spec, allow_major)?;
    eprintln!("{} {} ({})", "→".cyan(), spec.repo_slug().bold(), resolved.kind);
    println!("{}", resolved.git_ref);
    Ok(())
}

fn fetch(config: &WfrefConfig, input: &str, output: Option<&Path>, allow_major: bool) -> anyhow::Result<()> {
    let current = GitCurrentRepository::new()
        .with_git(config.tools.git.clone())
        .with_timeout(config.timeouts.git());
    let spec = parse_workflow_spec_with(input, &current)?;

    let remote = default_remote(config);
    let resolver = VersionResolver::new(&remote);
    let content = ContentFetcher::new(&remote).fetch_workflow(&spec, &resolver, allow_major)?;

    match output {
        Some(path) => {
            fs::write(path, content.bytes()).with_context(|| format!("writing {}", path.display()))?;
            let at = if content.git_ref().is_empty() {
                String::new()
            } else {
                format!(" @ {}", content.git_ref())
            };
            eprintln!("{} {}{} -> {}", "✓".green(), spec, at, path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.bytes()).context("writing to stdout")?;
            stdout.flush().context("writing to stdout")?;
        }
    }
    Ok(())
}

fn collect(config: &WfrefConfig, path: &Path) -> anyhow::Result<()> {
    let compiler = CommandCompiler::from_config(config);
    let collector = ImportCollector::from_config(&compiler, config);
    let files = if path.is_dir() {
        collector.collect_directory(path)?
    } else {
        collector.collect_workflow_files(path)?
    };
    for file in files {
        println!("{}", file.display());
    }
    Ok(())
}
