use anyhow::Context;
use clap::Parser;
use deedshift::adapters::PostgresTransferStore;
use deedshift::cli::{Cli, Commands, ListArgs};
use deedshift::domain::Decision;
use deedshift::logging::init_logging;
use deedshift::retry::with_retry;
use deedshift::{AppConfig, TransferError, TransferService};
use serde::Serialize;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("loading configuration from {}", cli.config_dir))?;
    init_logging(&config.logging);

    let store = PostgresTransferStore::new(
        &config.database.url,
        config.database.max_connections,
        config.database.acquire_timeout(),
    )
    .await
    .context("connecting to PostgreSQL")?;

    if let Commands::Migrate = cli.command {
        store.migrate().await?;
        info!("Schema is up to date");
        return Ok(());
    }

    let service = TransferService::from_store(store);
    let retry = config.retry_config();

    let outcome = match cli.command {
        Commands::Migrate => return Ok(()),
        Commands::Initiate { property, old, new } => {
            let transfer = with_retry(&retry, "initiate", || {
                service.initiate(property, &old, &new)
            })
            .await;
            transfer.and_then(|t| print_json(&t))
        }
        Commands::Approve(args) => {
            let outcome = with_retry(&retry, "approve", || {
                service.record_vote(args.transfer, args.owner, Decision::Approve)
            })
            .await;
            outcome.and_then(|o| print_json(&o))
        }
        Commands::Reject(args) => {
            let outcome = with_retry(&retry, "reject", || {
                service.record_vote(args.transfer, args.owner, Decision::Reject)
            })
            .await;
            outcome.and_then(|o| print_json(&o))
        }
        Commands::List(ListArgs { owner, property }) => {
            let views = match (owner, property) {
                (Some(owner), _) => {
                    with_retry(&retry, "list", || service.list_for_owner(owner)).await
                }
                (None, Some(property)) => {
                    with_retry(&retry, "list", || service.list_for_property(property)).await
                }
                (None, None) => Err(TransferError::Validation(
                    "either --owner or --property is required".to_string(),
                )),
            };
            views.and_then(|v| print_json(&v))
        }
    };

    if let Err(e) = outcome {
        error!(code = e.code(), "{}", e);
        eprintln!(
            "{}",
            serde_json::json!({ "error": e.to_string(), "code": e.code() })
        );
        std::process::exit(1);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TransferError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
