use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logwatch_incidents::config::{Config, LoggingConfig};
use logwatch_incidents::scan::LogMessage;
use logwatch_incidents::storage;

#[derive(Parser)]
#[command(
    name = "logwatch-incidents",
    about = "Rule-driven incident checks over recent log messages",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $LOGWATCH_CONFIG, then /etc/logwatch/logwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load all incident descriptions and run one scan cycle
    Check {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the incident descriptions that pass validation, and what was skipped
    Descriptions {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Store rule documents from a JSON file (one object or an array of objects)
    Import {
        /// Input file path
        #[arg(long)]
        file: PathBuf,
    },

    /// Append one log message
    Ingest {
        /// Originating host
        #[arg(long)]
        host: String,

        /// Syslog level (0 = emergency .. 7 = debug)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=7))]
        level: u8,

        /// Message text
        #[arg(long)]
        message: String,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Stderr subscriber used until the config (and its `[logging]` section) is known.
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || match &cli.config {
        Some(path) => Config::load(path),
        None => Ok(Config::load_or_default()),
    })?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    init_tracing(&config.logging);

    match cli.command {
        Commands::Check { json } => {
            let outcome = logwatch_incidents::run_check(&config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("\n=== Incident Check ===");
                if outcome.reports.is_empty() {
                    println!("No incident descriptions configured.");
                } else {
                    println!("{:<30} | {:<10} | Details", "Description", "Status");
                    println!("{:-<30}-|-{:-<10}-|-{:-<40}", "", "", "");
                    for report in &outcome.reports {
                        let details = match &report.outcome {
                            Ok(_) => format!("{} condition(s)", report.conditions),
                            Err(e) => e.to_string(),
                        };
                        println!("{:<30} | {:<10} | {}", report.title, report.status().to_uppercase(), details);
                    }
                }
                if !outcome.skipped.is_empty() {
                    println!(
                        "\nSkipped {} document(s) and {} condition(s); see log for details.",
                        outcome.skipped.skipped_documents(),
                        outcome.skipped.skipped_conditions()
                    );
                }
                println!();
            }
        }
        Commands::Descriptions { json } => {
            let store = logwatch_incidents::open_store(&config)?;
            let (descriptions, skipped) = logwatch_incidents::load_descriptions(&store).await?;
            if json {
                let body = serde_json::json!({
                    "descriptions": descriptions,
                    "skipped": skipped,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else if descriptions.is_empty() && skipped.is_empty() {
                println!("No incident descriptions found.");
            } else {
                println!("{:<30} | {:<8} | Conditions", "Title", "Window");
                println!("{:-<30}-|-{:-<8}-|-{:-<40}", "", "", "");
                for d in &descriptions {
                    let conditions = d
                        .conditions
                        .iter()
                        .map(|c| format!("{} {}={}", c.connector, c.subtype, c.value))
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!("{:<30} | {:<8} | {}", d.title, format!("{}s", d.timerange), conditions);
                }
                for event in &skipped.events {
                    let target = match (&event.description, event.condition_index) {
                        (Some(t), Some(i)) => format!("{} (condition #{})", t, i),
                        (Some(t), None) => t.clone(),
                        (None, _) => "<unnamed>".to_string(),
                    };
                    println!("skipped: {} -- {}", target, event.reason);
                }
            }
        }
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let documents = match value {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };

            let pool = storage::open_pool(&config.storage.db_path)?;
            for doc in &documents {
                let id = storage::insert_document(&pool, doc)?;
                tracing::debug!(id, "Stored incident document");
            }
            println!("Imported {} document(s).", documents.len());
        }
        Commands::Ingest { host, level, message } => {
            let pool = storage::open_pool(&config.storage.db_path)?;
            let id = storage::insert_message(
                &pool,
                &LogMessage {
                    host,
                    level,
                    message,
                    created_at: chrono::Utc::now(),
                },
            )?;
            println!("Stored message {}.", id);
        }
    }

    Ok(())
}
