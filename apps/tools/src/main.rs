use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client_core::RemoteSeatStore;
use occupancy::{display_class, elapsed_seconds, format_elapsed, SeatCollection, SeatLayout};
use shared::domain::{Seat, SeatLabel};
use storage::{SeatStore, Storage};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Maintenance commands for the seat table")]
struct Cli {
    /// Seat server to send changes through, so connected boards see them.
    #[arg(long, env = "APP__SERVER_URL", default_value = "http://127.0.0.1:8443")]
    server_url: String,
    /// Write the SQLite file directly instead. Only safe while the server is
    /// stopped; running boards will not see these writes until they refresh.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default layout, all seats available.
    Seed {
        /// Overwrite existing rows.
        #[arg(long)]
        force: bool,
    },
    List,
    Reset {
        label: SeatLabel,
    },
    ResetAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let cli = Cli::parse();

    let store: Arc<dyn SeatStore> = match &cli.database_url {
        Some(database_url) => {
            warn!(%database_url, "writing the database directly; connected boards must refresh");
            Arc::new(Storage::new(database_url).await?)
        }
        None => Arc::new(RemoteSeatStore::new(&cli.server_url)?),
    };

    let output = match cli.command {
        Command::Seed { force } => seed(store.as_ref(), force).await?,
        Command::List => list(store.as_ref(), Utc::now()).await?,
        Command::Reset { label } => reset(store.as_ref(), label).await?,
        Command::ResetAll => reset_all(store.as_ref()).await?,
    };
    println!("{output}");
    Ok(())
}

async fn seed(store: &dyn SeatStore, force: bool) -> Result<String> {
    let existing = store.load_all().await?.len();
    if existing > 0 && !force {
        return Ok(format!(
            "seat table already holds {existing} rows; pass --force to overwrite"
        ));
    }
    let seats = SeatCollection::from_layout(&SeatLayout::default());
    store.save_all(&seats).await?;
    info!(seats = seats.len(), force, backend = store.backend_name(), "seeded seat table");
    Ok(format!("seeded {} seats", seats.len()))
}

async fn list(store: &dyn SeatStore, now: DateTime<Utc>) -> Result<String> {
    let seats = store.load_all().await?;
    if seats.is_empty() {
        return Ok("no seats; run `tools seed` first".to_string());
    }
    let lines: Vec<String> = seats
        .iter()
        .map(|(label, seat)| {
            let id = label.to_string();
            let class = display_class(seat, now);
            if seat.occupied {
                format!(
                    "{id:<4} {:<12} {}",
                    class.label(),
                    format_elapsed(elapsed_seconds(seat, now))
                )
            } else {
                format!("{id:<4} {}", class.label())
            }
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn reset(store: &dyn SeatStore, label: SeatLabel) -> Result<String> {
    store.save_one(&label, &Seat::available()).await?;
    Ok(format!("reset {label}"))
}

async fn reset_all(store: &dyn SeatStore) -> Result<String> {
    let seats: SeatCollection = store
        .load_all()
        .await?
        .iter()
        .map(|(label, _)| (*label, Seat::available()))
        .collect();
    store.save_all(&seats).await?;
    Ok(format!("reset {} seats", seats.len()))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
