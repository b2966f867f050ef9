use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::{load_settings, BackendKind},
    SeatController, SeatRenderer, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod input;
mod render;

use input::{parse_line, UserInput, HELP};
use render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(about = "Terminal seat occupancy board")]
struct Args {
    /// Client config file; `seats.toml` is read when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend: Option<BackendKind>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    local_path: Option<PathBuf>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(local_path) = args.local_path {
        settings.local_path = local_path;
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        settings.poll_interval_ms = poll_interval_ms.max(1);
    }

    let store = settings.build_store()?;
    let handle = SeatController::start(
        store,
        Arc::new(SystemClock),
        settings.layout,
        settings.sync_settings(),
    )
    .await;
    info!(mode = ?handle.sync_mode(), "{HELP}");

    let mut renderer = TerminalRenderer::stdout();
    let mut views = handle.subscribe();
    let first = views.borrow_and_update().clone();
    renderer.render(&first)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("seat controller stopped");
                    break;
                }
                let view = views.borrow_and_update().clone();
                renderer.render(&view)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(UserInput::Command(command))) => handle.send(command).await?,
                    Ok(Some(UserInput::Help)) => eprintln!("{HELP}"),
                    Ok(Some(UserInput::Quit)) => break,
                    Ok(None) => {}
                    Err(error) => eprintln!("{error}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await
}
