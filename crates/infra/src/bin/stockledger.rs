use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use stockledger_core::{InventoryRecordId, VariantId};
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::{InventoryCoordinator, LedgerConfig, PostgresLedger, db};
use stockledger_inventory::InventoryEvent;

#[derive(Parser)]
#[command(name = "stockledger")]
#[command(about = "Inventory ledger administration and reporting")]
#[command(
    after_help = "Environment:\n  DATABASE_URL               Postgres connection string\n  DATABASE_MAX_CONNECTIONS   Pool size (default 10)\n  INVENTORY_LOCK_TIMEOUT_MS  Record lock wait bound\n  LOG_FORMAT                 'pretty' for human-readable logs"
)]
struct Cli {
    /// Overrides DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the embedded schema migrations.
    Migrate,
    /// List records at or below their reorder point.
    LowStock,
    /// List every record of a variant, ordered by location.
    ByVariant { variant_id: Uuid },
    /// List every record at a location.
    ByLocation { location: String },
    /// Show a single record.
    Get { record_id: Uuid },
    /// Print the stock movement trail of a record, oldest first.
    Movements { record_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    stockledger_observability::init();
    let cli = Cli::parse();

    let mut config = LedgerConfig::from_env().context("invalid configuration")?;
    if cli.database_url.is_some() {
        config.database_url = cli.database_url;
    }

    let pool = db::connect(&config)
        .await
        .context("could not open the database pool")?;

    let mut ledger = PostgresLedger::new(pool.clone());
    if let Some(timeout) = config.lock_timeout {
        ledger = ledger.with_lock_timeout(timeout);
    }
    // Reporting only reads, so nothing is ever published on this bus.
    let bus = Arc::new(InMemoryEventBus::<EventEnvelope<InventoryEvent>>::new());
    let coordinator = InventoryCoordinator::new(ledger, bus);

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&pool).await?;
            tracing::info!("migrations applied");
        }
        Commands::LowStock => print_lines(&coordinator.get_low_stock_items().await?)?,
        Commands::ByVariant { variant_id } => print_lines(
            &coordinator
                .find_by_variant(VariantId::from_uuid(variant_id))
                .await?,
        )?,
        Commands::ByLocation { location } => {
            print_lines(&coordinator.find_by_location(&location).await?)?
        }
        Commands::Get { record_id } => print_lines(&[coordinator
            .get(InventoryRecordId::from_uuid(record_id))
            .await?])?,
        Commands::Movements { record_id } => print_lines(
            &coordinator
                .movements(InventoryRecordId::from_uuid(record_id))
                .await?,
        )?,
    }

    Ok(())
}

fn print_lines<T: Serialize>(items: &[T]) -> Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}
