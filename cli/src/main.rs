// Tollgate CLI - Command Line Interface Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use tollgate_config::{Config, ConfigLoader, ServerConnection, ServerManifest};
use tollgate_core::review::{cancel_review, record_decision};
use tollgate_protocol::{ReviewDecision, ReviewId, ReviewStatus};
use tollgate_state::{ReviewDb, ReviewStore};

/// Tollgate - review gated tool calls
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(version, about, long_about = None)]
struct TopCli {
    #[clap(flatten)]
    config_overrides: CliConfigOverrides,

    /// Review database (overrides `state.db_path`)
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

/// CLI configuration overrides
#[derive(Debug, clap::Args)]
struct CliConfigOverrides {
    /// Configuration override in key=value format
    #[arg(short = 'c', long = "config", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,
}

/// Available commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect and decide tool calls awaiting review
    Reviews {
        #[command(subcommand)]
        reviews_command: ReviewsCommands,
    },

    /// Tool-server manifest
    Manifest {
        #[command(subcommand)]
        manifest_command: ManifestCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

/// Review commands
#[derive(Debug, Subcommand)]
enum ReviewsCommands {
    /// List reviews awaiting a decision
    List {
        /// Include resolved, consumed, cancelled and expired reviews
        #[arg(long)]
        all: bool,
    },

    /// Show one review with its request and decision
    Show {
        /// Review id
        id: String,
    },

    /// Record a decision, e.g. '{"type":"accept"}' or '{"type":"response","args":"no"}'
    Resolve {
        /// Review id
        id: String,

        /// Decision JSON
        decision: String,
    },

    /// Withdraw a pending review
    Cancel {
        /// Review id
        id: String,
    },
}

/// Manifest commands
#[derive(Debug, Subcommand)]
enum ManifestCommands {
    /// Validate the manifest and list its servers
    Check {
        /// Manifest path (defaults to the configured one)
        path: Option<PathBuf>,
    },
}

/// Configuration commands
#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string())
                .as_str(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = TopCli::parse();

    let loader = ConfigLoader::new().with_project_dir(std::env::current_dir()?);
    let config = loader
        .load_with_cli_overrides(&cli.config_overrides.overrides)
        .context("failed to load configuration")?;
    debug!(?config, "configuration loaded");

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Reviews { reviews_command } => {
            let path = cli.db.unwrap_or_else(|| config.state.resolved_db_path());
            let db = ReviewDb::open(&path)
                .await
                .with_context(|| format!("failed to open review database {}", path.display()))?;
            let result = handle_reviews_command(&db, reviews_command, &mut out).await;
            db.close().await;
            result?;
        }
        Commands::Manifest { manifest_command } => {
            handle_manifest_command(&loader, &config, manifest_command, &mut out).await?;
        }
        Commands::Config { config_command } => {
            handle_config_command(&config, config_command, &mut out)?;
        }
    }

    Ok(())
}

/// Handle review commands
async fn handle_reviews_command(
    store: &dyn ReviewStore,
    cmd: ReviewsCommands,
    out: &mut impl Write,
) -> Result<()> {
    match cmd {
        ReviewsCommands::List { all } => {
            let filter = if all { None } else { Some(ReviewStatus::Pending) };
            let records = store.list(filter).await?;
            if records.is_empty() {
                writeln!(out, "No reviews.")?;
            }
            for record in records {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    record.id,
                    record.status,
                    record.request.action(),
                    record.created_at.to_rfc3339()
                )?;
            }
        }
        ReviewsCommands::Show { id } => {
            let id = ReviewId::from(id);
            let record = store
                .get(&id)
                .await?
                .with_context(|| format!("unknown review {id}"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
        }
        ReviewsCommands::Resolve { id, decision } => {
            let id = ReviewId::from(id);
            let value: serde_json::Value =
                serde_json::from_str(&decision).context("decision is not valid JSON")?;
            let decision = ReviewDecision::from_value(value)?;
            record_decision(store, &id, &decision).await?;
            info!(review_id = %id, decision = decision.tag(), "decision recorded");
            writeln!(out, "Review {id}: {}", decision.tag())?;
        }
        ReviewsCommands::Cancel { id } => {
            let id = ReviewId::from(id);
            cancel_review(store, &id).await?;
            info!(review_id = %id, "review cancelled");
            writeln!(out, "Review {id}: cancelled")?;
        }
    }
    Ok(())
}

/// Handle manifest commands
async fn handle_manifest_command(
    loader: &ConfigLoader,
    config: &Config,
    cmd: ManifestCommands,
    out: &mut impl Write,
) -> Result<()> {
    match cmd {
        ManifestCommands::Check { path } => {
            let manifest = match path {
                Some(path) => ServerManifest::load(&path).await?,
                None => loader.load_manifest(config).await?,
            };
            print_manifest(&manifest, out)?;
        }
    }
    Ok(())
}

fn print_manifest(manifest: &ServerManifest, out: &mut impl Write) -> Result<()> {
    let connections = manifest.connections()?;
    if connections.is_empty() {
        writeln!(out, "No servers configured.")?;
    }
    for (name, connection) in connections {
        match connection {
            ServerConnection::Stdio { command, args, .. } => {
                let line = format!("{command} {}", args.join(" "));
                writeln!(out, "{name}\tstdio\t{}", line.trim_end())?;
            }
            ServerConnection::Remote { transport, url, .. } => {
                writeln!(out, "{name}\t{}\t{url}", transport.as_str())?;
            }
        }
    }
    Ok(())
}

/// Handle config commands
fn handle_config_command(config: &Config, cmd: ConfigCommands, out: &mut impl Write) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            write!(out, "{}", toml::to_string_pretty(config)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tollgate_protocol::{ActionRequest, ReviewPolicy, ReviewRecord, ReviewRequest};

    async fn seeded_db() -> ReviewDb {
        let db = ReviewDb::open_in_memory().await.unwrap();
        let mut args = serde_json::Map::new();
        args.insert("a".to_string(), 2.into());
        let request = ReviewRequest::new(
            ActionRequest::new("add", args),
            ReviewPolicy::default(),
            "Please review the tool call",
        );
        db.insert(&ReviewRecord::pending(ReviewId::from("r1"), request))
            .await
            .unwrap();
        db
    }

    async fn run(db: &ReviewDb, cmd: ReviewsCommands) -> Result<String> {
        let mut out = Vec::new();
        handle_reviews_command(db, cmd, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let cli = TopCli::try_parse_from([
            "tollgate",
            "reviews",
            "list",
            "--all",
            "--db",
            "/tmp/r.db",
            "-c",
            "review.timeout_secs=30",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/r.db")));
        assert_eq!(cli.config_overrides.overrides, vec!["review.timeout_secs=30"]);
        assert!(matches!(
            cli.command,
            Commands::Reviews {
                reviews_command: ReviewsCommands::List { all: true }
            }
        ));
    }

    #[tokio::test]
    async fn list_shows_pending_reviews() {
        let db = seeded_db().await;
        let listed = run(&db, ReviewsCommands::List { all: false }).await.unwrap();
        assert!(listed.starts_with("r1\tpending\tadd\t"));
    }

    #[tokio::test]
    async fn resolve_records_the_decision() {
        let db = seeded_db().await;
        let printed = run(
            &db,
            ReviewsCommands::Resolve {
                id: "r1".to_string(),
                decision: r#"{"type":"response","args":"not now"}"#.to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(printed, "Review r1: response\n");

        let record = db.get(&ReviewId::from("r1")).await.unwrap().unwrap();
        assert_eq!(record.status, ReviewStatus::Resolved);
        assert_eq!(record.decision, Some(ReviewDecision::respond("not now")));

        let pending = run(&db, ReviewsCommands::List { all: false }).await.unwrap();
        assert_eq!(pending, "No reviews.\n");
    }

    #[tokio::test]
    async fn resolve_rejects_bad_input() {
        let db = seeded_db().await;
        let not_json = run(
            &db,
            ReviewsCommands::Resolve {
                id: "r1".to_string(),
                decision: "accept".to_string(),
            },
        )
        .await;
        assert!(not_json.is_err());

        let unknown = run(
            &db,
            ReviewsCommands::Resolve {
                id: "missing".to_string(),
                decision: r#"{"type":"accept"}"#.to_string(),
            },
        )
        .await;
        assert!(unknown.is_err());

        let record = db.get(&ReviewId::from("r1")).await.unwrap().unwrap();
        assert_eq!(record.status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_then_resolve_fails() {
        let db = seeded_db().await;
        run(&db, ReviewsCommands::Cancel { id: "r1".to_string() })
            .await
            .unwrap();
        let late = run(
            &db,
            ReviewsCommands::Resolve {
                id: "r1".to_string(),
                decision: r#"{"type":"accept"}"#.to_string(),
            },
        )
        .await;
        assert!(late.is_err());
    }

    #[test]
    fn config_show_prints_toml() {
        let mut out = Vec::new();
        handle_config_command(&Config::default(), ConfigCommands::Show, &mut out).unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("[review]"));
        assert!(shown.contains("description = \"Please review the tool call\""));
    }
}
