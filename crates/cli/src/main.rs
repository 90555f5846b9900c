//! braid command-line tool.
//!
//! Provides subcommands for advancing an integration branch from a topic
//! list, rebuilding bundle branches, and generating / validating
//! configuration files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use braid_core::bundle::{BundleComposer, ComposeOptions};
use braid_core::config::{BraidConfig, CONFIG_FILE_NAME};
use braid_core::engine::{IntegrationEngine, IntegrationPlan};
use braid_core::errors::ListError;
use braid_core::git::GitClient;
use braid_core::lists;
use braid_core::models::{BundleReport, IntegrationReport};
use braid_core::strategy::Strategy;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// braid command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "braid",
    version,
    about = "Maintain integration and bundle branches built from topic lists"
)]
struct Cli {
    /// Path inside the Git repository to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Path to the TOML configuration file (default: <repo>/braid.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the run report as JSON instead of a summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply topics, in order, to the integration branch.
    Integrate {
        /// Topics to apply; overrides the topics file.
        topics: Vec<String>,

        /// Topic list file, relative to the repository root.
        #[arg(long)]
        topics_file: Option<PathBuf>,

        /// Branch to advance.
        #[arg(long)]
        target: Option<String>,

        /// Base ref for a new target branch and for pick/squash ranges.
        #[arg(long)]
        base: Option<String>,

        /// merge, pick, or squash.
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Publish the target branch after a successful run.
        #[arg(long)]
        push: bool,
    },

    /// Rebuild bundle branches from the base ref.
    Bundles {
        /// Bundle list file, relative to the repository root.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Ref every bundle is rebuilt from.
        #[arg(long)]
        base: Option<String>,

        /// Only rebuild the named bundle (repeatable).
        #[arg(long)]
        only: Vec<String>,

        /// Publish the bundles after all of them succeed.
        #[arg(long)]
        push: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path (default: <repo>/braid.toml).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration, topic list, and bundle list.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { output, force } = &cli.command {
        init_tracing(&cli, "info");
        let output = output
            .clone()
            .unwrap_or_else(|| cli.repo.join(CONFIG_FILE_NAME));
        return cmd_init(&output, *force);
    }

    let git = GitClient::new(&cli.repo).context("failed to open repository")?;
    let config = load_config(&cli, git.repo_path())?;
    init_tracing(&cli, &config.general.log_level);
    let git = git.with_identity(config.identity.committer());

    match cli.command {
        Commands::Integrate {
            topics,
            topics_file,
            target,
            base,
            strategy,
            push,
        } => {
            let overrides = IntegrateOverrides {
                topics,
                topics_file,
                target,
                base,
                strategy,
                push,
            };
            cmd_integrate(&git, &config, overrides, cli.json).await
        }
        Commands::Bundles {
            file,
            base,
            only,
            push,
        } => cmd_bundles(&git, &config, file, base, &only, push, cli.json).await,
        Commands::Validate => cmd_validate(&git, &config),
        Commands::Init { .. } => Ok(()),
    }
}

/// `RUST_LOG` wins; otherwise the configured level adjusted by `-v`/`--quiet`.
fn init_tracing(cli: &Cli, config_level: &str) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => config_level,
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli, repo_root: &Path) -> Result<BraidConfig> {
    let config = match &cli.config {
        Some(path) => {
            BraidConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => BraidConfig::load_or_default(repo_root).context("failed to load configuration")?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

struct IntegrateOverrides {
    topics: Vec<String>,
    topics_file: Option<PathBuf>,
    target: Option<String>,
    base: Option<String>,
    strategy: Option<Strategy>,
    push: bool,
}

async fn cmd_integrate(
    git: &GitClient,
    config: &BraidConfig,
    overrides: IntegrateOverrides,
    json: bool,
) -> Result<()> {
    let topics = if overrides.topics.is_empty() {
        let file = overrides
            .topics_file
            .unwrap_or_else(|| config.integration.topics_file.clone());
        lists::read_topics(git.repo_path().join(file)).context("failed to read topic list")?
    } else {
        // Same deduplication rules as the topics file.
        lists::parse_topics(&overrides.topics.join("\n"), "<command line>")
    };

    let mut plan = IntegrationPlan::from_config(config, topics);
    if let Some(target) = overrides.target {
        plan.target_branch = target;
    }
    if let Some(base) = overrides.base {
        plan.base_ref = base;
    }
    if let Some(strategy) = overrides.strategy {
        plan.strategy = strategy;
    }
    if overrides.push {
        plan.publish_to = Some(config.integration.remote.clone());
    }
    debug!(?plan, "integration plan");

    let engine = IntegrationEngine::new(config).context("invalid identity configuration")?;
    let report = match engine.run(git, &plan).await {
        Ok(report) => report,
        Err(e) => {
            if e.is_conflict() {
                eprintln!(
                    "{}",
                    style::warn("Resolve the conflicts and commit, then re-run `braid integrate`.")
                );
            }
            return Err(e).with_context(|| format!("failed to integrate '{}'", plan.target_branch));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_integration_report(&report);
    }
    Ok(())
}

async fn cmd_bundles(
    git: &GitClient,
    config: &BraidConfig,
    file: Option<PathBuf>,
    base: Option<String>,
    only: &[String],
    push: bool,
    json: bool,
) -> Result<()> {
    let file = file.unwrap_or_else(|| config.bundles.file.clone());
    let mut bundles =
        lists::read_bundles(git.repo_path().join(file)).context("failed to read bundle list")?;

    if !only.is_empty() {
        for name in only {
            if !bundles.iter().any(|b| &b.name == name) {
                anyhow::bail!("no bundle named '{}' in the bundle list", name);
            }
        }
        bundles.retain(|b| only.contains(&b.name));
    }

    let options = ComposeOptions {
        base_ref: base.unwrap_or_else(|| config.bundles.base_ref.clone()),
        publish_to: push.then(|| config.integration.remote.clone()),
    };
    let composer = BundleComposer::from_config(config);
    let reports = match composer.compose_all(git, &bundles, &options).await {
        Ok(reports) => reports,
        Err(e) => {
            if e.is_conflict() {
                eprintln!(
                    "{}",
                    style::warn("The merge is left in progress; resolve or abort it before re-running.")
                );
            }
            return Err(e).context("failed to compose bundles");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_bundle_reports(&reports);
    }
    Ok(())
}

fn cmd_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "file already exists: {}. Use --force to overwrite it.",
            output.display()
        );
    }
    std::fs::write(output, BraidConfig::default_template())
        .context("failed to write config file")?;

    println!("{}", style::success(&format!("Configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. List topics, one per line, in .integration/topics");
    println!("  2. Optionally define bundles as 'name: topic topic' in .integration/bundles");
    println!("  3. Validate with: braid validate");
    Ok(())
}

fn cmd_validate(git: &GitClient, config: &BraidConfig) -> Result<()> {
    let root = git.repo_path();
    println!("Validating braid setup in {}", root.display());
    println!();
    println!("  {}", style::success("Configuration is valid"));

    let topics_path = root.join(&config.integration.topics_file);
    match lists::read_topics(&topics_path) {
        Ok(topics) => println!(
            "  {}",
            style::success(&format!("Topic list: {} topic(s)", topics.len()))
        ),
        Err(ListError::FileNotFound(path)) => {
            println!("  {}", style::warn(&format!("Topic list not found: {path}")))
        }
        Err(e) => {
            println!("  {}", style::error(&format!("Topic list: {e}")));
            anyhow::bail!("topic list validation failed");
        }
    }

    let bundles_path = root.join(&config.bundles.file);
    match lists::read_bundles(&bundles_path) {
        Ok(bundles) => println!(
            "  {}",
            style::success(&format!("Bundle list: {} bundle(s)", bundles.len()))
        ),
        Err(ListError::FileNotFound(path)) => {
            println!("  {}", style::warn(&format!("Bundle list not found: {path}")))
        }
        Err(e) => {
            println!("  {}", style::error(&format!("Bundle list: {e}")));
            anyhow::bail!("bundle list validation failed");
        }
    }

    let integration = &config.integration;
    println!();
    println!("Configuration summary:");
    println!("  Target branch : {}", integration.target_branch);
    println!("  Base ref      : {}", integration.base_ref);
    println!("  Strategy      : {}", integration.strategy);
    println!("  Remotes       : {}", config.refs.remote_prefixes.join(", "));
    println!(
        "  Publish       : {}",
        if integration.push {
            integration.remote.as_str()
        } else {
            "disabled"
        }
    );
    println!(
        "  Auto-resolve  : {}",
        config.conflicts.auto_resolve_paths.join(", ")
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_integration_report(report: &IntegrationReport) {
    println!(
        "{}",
        style::header(&format!(
            "{} ({}): {} applied, {} skipped",
            report.target_branch,
            report.strategy,
            report.applied_count(),
            report.skipped_count()
        ))
    );
    for topic in &report.topics {
        println!(
            "  {:<32} {}",
            topic.resolved.name,
            style::topic_outcome(&topic.outcome)
        );
    }
    println!();
    if report.is_noop() {
        println!(
            "{}",
            style::dim(&format!(
                "head unchanged at {}",
                style::short_sha(&report.final_head)
            ))
        );
    } else {
        println!(
            "head {} -> {}",
            style::short_sha(&report.initial_head),
            style::short_sha(&report.final_head)
        );
    }
    if report.published {
        println!("{}", style::success("published"));
    }
}

fn print_bundle_reports(reports: &[BundleReport]) {
    if reports.is_empty() {
        println!("No bundles defined.");
        return;
    }
    for report in reports {
        println!(
            "{} {}",
            style::header(&report.name),
            style::dim(&format!(
                "{} -> {}",
                style::short_sha(&report.base),
                style::short_sha(&report.head)
            ))
        );
        for topic in &report.topics {
            println!(
                "  {:<32} {}",
                topic.resolved.name,
                style::bundle_outcome(topic.outcome)
            );
        }
        if report.published {
            println!("  {}", style::success("published"));
        }
    }
}
