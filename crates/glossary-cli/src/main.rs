mod prompt;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use glossary_catalog::CatalogClient;
use glossary_core::{
    delete_published, order, ConfigManager, DryRunService, FailurePolicy, GlossaryConfig,
    LocationMap, LoggingConfig, OverwritePolicy, RemoteTermService, SyncReport, Synchronizer,
    TermOutcome, TermSource,
};
use glossary_csv::CsvTermSource;
use prompt::StdinPrompt;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "glossary")]
#[command(about = "Publish a CSV glossary into a data catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Configuration file
    #[arg(short, long, global = true, env = "GLOSSARY_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update every term of a CSV file in the catalog
    Sync {
        /// CSV input file
        #[arg(short, long)]
        input: PathBuf,

        /// Write the id to location map here after the run
        #[arg(long)]
        save_map: Option<PathBuf>,

        /// Read the catalog but report planned writes instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Existing terms: always, never or prompt
        #[arg(long)]
        overwrite: Option<OverwritePolicy>,

        /// After a failed call: continue or abort
        #[arg(long)]
        on_error: Option<FailurePolicy>,

        /// Sibling terms sent at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Delete every term recorded in a location map
    Cleanup {
        /// Map written by `sync --save-map`
        #[arg(short, long)]
        map: PathBuf,
    },

    /// Check a CSV file's hierarchy without contacting the catalog
    Validate {
        /// CSV input file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        /// Target path
        #[arg(default_value = ".glossary.toml")]
        path: PathBuf,
    },
}

/// Command result plus whether every step succeeded.
struct CommandOutput {
    value: serde_json::Value,
    complete: bool,
}

impl CommandOutput {
    fn done(value: serde_json::Value) -> Self {
        Self {
            value,
            complete: true,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => {
            print_output(&cli.output, &output.value)?;
            if !output.complete {
                std::process::exit(2);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<CommandOutput> {
    match &cli.command {
        Commands::InitConfig { path } => {
            ConfigManager::create_default_config(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(CommandOutput::done(json!({
                "config_file": path.display().to_string(),
                "status": "created",
            })))
        }
        Commands::Validate { input } => {
            load_config(cli)?;
            execute_validate(input)
        }
        Commands::Cleanup { map } => {
            let manager = load_config(cli)?;
            execute_cleanup(manager.config(), map).await
        }
        Commands::Sync {
            input,
            save_map,
            dry_run,
            overwrite,
            on_error,
            concurrency,
        } => {
            let manager = load_config(cli)?;
            let config = manager.config();
            let mut options = config.sync.options();
            if let Some(overwrite) = overwrite {
                options.overwrite = *overwrite;
            }
            if let Some(on_error) = on_error {
                options.on_error = *on_error;
            }
            if let Some(concurrency) = concurrency {
                anyhow::ensure!(*concurrency > 0, "--concurrency must be at least 1");
                options.concurrency = *concurrency;
            }
            execute_sync(config, input, save_map.as_deref(), *dry_run, options).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<ConfigManager> {
    let manager =
        ConfigManager::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&manager.config().logging, cli.verbose);
    Ok(manager)
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "compact" {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn read_input(input: &Path) -> Result<Vec<glossary_core::TermRecord>> {
    CsvTermSource::new(input)
        .read_all()
        .with_context(|| format!("Failed to read glossary terms from {}", input.display()))
}

fn catalog_client(config: &GlossaryConfig) -> Result<Arc<CatalogClient>> {
    let client = CatalogClient::from_config(config).context("Failed to create catalog client")?;
    Ok(Arc::new(client))
}

/// The first Ctrl-C cancels `token` so in-flight batches finish and the rest is
/// skipped. A second one exits at once, e.g. while an overwrite prompt waits.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, finishing in-flight requests (press Ctrl-C again to exit)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} interrupted", "Error:".red().bold());
            std::process::exit(130);
        }
    });
}

async fn execute_sync(
    config: &GlossaryConfig,
    input: &Path,
    save_map: Option<&Path>,
    dry_run: bool,
    options: glossary_core::SyncOptions,
) -> Result<CommandOutput> {
    let records = read_input(input)?;
    let client = catalog_client(config)?;
    let service: Arc<dyn RemoteTermService> = if dry_run {
        info!("Dry run: no changes will be sent to the catalog");
        Arc::new(DryRunService::new(client))
    } else {
        client
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut synchronizer = Synchronizer::new(service, options).with_cancellation(cancel);
    if options.overwrite == OverwritePolicy::Prompt {
        synchronizer = synchronizer.with_prompt(Arc::new(StdinPrompt));
    }

    let report = synchronizer
        .sync_records(records)
        .await
        .context("Glossary synchronization failed")?;

    let mut map_file = None;
    if let Some(path) = save_map {
        if dry_run {
            warn!("Dry run: not writing location map to {}", path.display());
        } else {
            report
                .locations
                .save(path)
                .with_context(|| format!("Failed to write location map {}", path.display()))?;
            map_file = Some(path.display().to_string());
        }
    }

    Ok(CommandOutput {
        value: sync_output(&report, dry_run, map_file),
        complete: report.is_complete(),
    })
}

fn sync_output(report: &SyncReport, dry_run: bool, map_file: Option<String>) -> serde_json::Value {
    let terms: Vec<serde_json::Value> = report
        .terms
        .iter()
        .map(|term| {
            let (status, detail) = match &term.outcome {
                TermOutcome::Created { location } => ("created", location.clone()),
                TermOutcome::Updated { location } => ("updated", location.clone()),
                TermOutcome::Kept { location } => ("kept", location.clone()),
                TermOutcome::Failed { error } => ("failed", error.clone()),
                TermOutcome::Unresolvable { parent_id } => {
                    ("unresolvable", format!("parent {parent_id} was not published"))
                }
            };
            json!({
                "id": term.id,
                "path": term.name_path.join("->"),
                "status": status,
                "detail": detail,
            })
        })
        .collect();

    json!({
        "dry_run": dry_run,
        "summary": report.summary(),
        "cancelled": report.cancelled,
        "aborted": report.aborted,
        "map_file": map_file,
        "terms": terms,
    })
}

async fn execute_cleanup(config: &GlossaryConfig, map_path: &Path) -> Result<CommandOutput> {
    let mut map = LocationMap::load(map_path)
        .with_context(|| format!("Failed to read location map {}", map_path.display()))?;
    let client = catalog_client(config)?;

    let report = delete_published(&mut map, client.as_ref()).await;
    map.save(map_path)
        .with_context(|| format!("Failed to rewrite location map {}", map_path.display()))?;

    Ok(CommandOutput {
        complete: report.failed.is_empty(),
        value: json!({
            "deleted": report.deleted.len(),
            "failed": report.failed,
            "remaining": map.len(),
            "map_file": map_path.display().to_string(),
        }),
    })
}

fn execute_validate(input: &Path) -> Result<CommandOutput> {
    let records = read_input(input)?;
    let hierarchy = order(records).context("Invalid glossary hierarchy")?;

    let terms: Vec<serde_json::Value> = hierarchy
        .terms()
        .iter()
        .enumerate()
        .map(|(position, term)| {
            json!({
                "id": term.id,
                "path": hierarchy.name_path(&term.id).join("->"),
                "depth": hierarchy.depth(position),
            })
        })
        .collect();

    Ok(CommandOutput::done(json!({
        "valid": true,
        "term_count": hierarchy.len(),
        "terms": terms,
    })))
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, indent: usize) -> Result<()> {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => {
                        let s = match key.as_str() {
                            "status" => status_colored(s),
                            _ => s.green(),
                        };
                        println!("{}{}: {}", pad, key_colored, s);
                    }
                    serde_json::Value::Number(n) => {
                        println!("{}{}: {}", pad, key_colored, n.to_string().yellow());
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b {
                            "true".green()
                        } else {
                            "false".red()
                        };
                        println!("{}{}: {}", pad, key_colored, val_colored);
                    }
                    serde_json::Value::Null => {
                        println!("{}{}: {}", pad, key_colored, "-".dimmed());
                    }
                    nested => {
                        println!("{}{}:", pad, key_colored);
                        print_pretty(nested, indent + 1)?;
                    }
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{}{}{}:", pad, "Item ".cyan(), (i + 1).to_string().yellow());
                print_pretty(item, indent + 1)?;
            }
        }
        _ => {
            println!("{}{}", pad, serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

fn status_colored(status: &str) -> colored::ColoredString {
    match status {
        "created" | "updated" => status.green().bold(),
        "kept" => status.blue(),
        "failed" | "unresolvable" => status.red().bold(),
        _ => status.normal(),
    }
}
