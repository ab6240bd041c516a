//! SkyTrack - live flight positions from OpenSky in the terminal

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skytrack_core::{BoundingBox, BoundingBoxControl, Credentials};
use skytrack_opensky::{RetryingFetcher, TokenManager};
use skytrack_tracker::canvas::TextCanvas;
use skytrack_tracker::commands::{run_command_loop, spawn_stdin_reader, HELP};
use skytrack_tracker::config::Config;
use skytrack_tracker::loops::poll_loop::{run_poll_loop, PollOrchestrator};
use skytrack_tracker::loops::render_loop::run_render_loop;
use skytrack_tracker::state::Session;

/// Command-line overrides; anything unset falls back to SKYTRACK_* env vars.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OAuth client id
    #[arg(long)]
    client_id: Option<String>,

    /// OAuth client secret
    #[arg(long)]
    client_secret: Option<String>,

    /// Bounding box as lamin,lomin,lamax,lomax
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<BoundingBox>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Retries on HTTP 429 before a poll fails
    #[arg(long)]
    max_retries: Option<u32>,

    /// Canvas width in terminal cells
    #[arg(long)]
    width: Option<usize>,

    /// Canvas height in terminal cells
    #[arg(long)]
    height: Option<usize>,

    #[arg(long)]
    token_url: Option<String>,

    #[arg(long)]
    data_url: Option<String>,

    #[arg(long)]
    http_timeout_secs: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let (Some(id), Some(secret)) = (self.client_id, self.client_secret) {
            config.credentials = Some(Credentials::new(id, secret));
        }
        if let Some(bbox) = self.bbox {
            config.bbox = bbox;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.frame_interval_ms {
            config.frame_interval = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(w) = self.width {
            config.canvas_width = w;
        }
        if let Some(h) = self.height {
            config.canvas_height = h;
        }
        if let Some(url) = self.token_url {
            config.token_url = url;
        }
        if let Some(url) = self.data_url {
            config.data_url = url;
        }
        if let Some(secs) = self.http_timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the canvas.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("skytrack=info".parse()?))
        .init();

    let mut config = Config::from_env().context("invalid SKYTRACK_* environment")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    tracing::info!("Starting SkyTrack...");
    tracing::info!("{}", HELP);

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let session = Arc::new(Session::new(
        TokenManager::new(client.clone(), config.token_url.clone()),
        BoundingBoxControl::new(config.bbox),
    ));
    if let Some(credentials) = config.credentials.clone() {
        session.login(credentials).await;
    }

    let fetcher = RetryingFetcher::new(client).with_max_retries(config.max_retries);
    let orchestrator = Arc::new(PollOrchestrator::new(
        session.clone(),
        fetcher,
        config.data_url.clone(),
    ));

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(4);

    let poll = tokio::spawn(run_poll_loop(
        orchestrator.clone(),
        config.poll_interval,
        shutdown_tx.subscribe(),
    ));
    let render = tokio::spawn(run_render_loop(
        session.clone(),
        Box::new(TextCanvas::stdout(config.canvas_width, config.canvas_height)),
        config.poll_interval,
        config.frame_interval,
        shutdown_tx.subscribe(),
    ));
    tokio::spawn(run_command_loop(
        spawn_stdin_reader(),
        orchestrator,
        shutdown_tx.clone(),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
        _ = shutdown_rx.recv() => {}
    }
    let _ = shutdown_tx.send(());
    let _ = tokio::join!(poll, render);

    tracing::info!("SkyTrack stopped");
    Ok(())
}
