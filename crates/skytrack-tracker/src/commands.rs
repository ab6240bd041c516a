//! Line-oriented controls read from stdin.

use std::io::BufRead;
use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, mpsc};

use skytrack_core::{BoundingBox, Credentials};

use crate::loops::poll_loop::PollOrchestrator;

pub const HELP: &str = "commands: login <client_id> <client_secret> | bbox <lamin> <lomin> <lamax> <lomax> | refresh | status | dismiss | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login(Credentials),
    /// Unvalidated; validation happens when the box is applied.
    Bbox(BoundingBox),
    Refresh,
    Status,
    Dismiss,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("login", [id, secret]) => Command::Login(Credentials::new(*id, *secret)),
        ("login", _) => bail!("usage: login <client_id> <client_secret>"),
        ("bbox", [lamin, lomin, lamax, lomax]) => Command::Bbox(BoundingBox {
            lamin: parse_degrees("lamin", lamin)?,
            lomin: parse_degrees("lomin", lomin)?,
            lamax: parse_degrees("lamax", lamax)?,
            lomax: parse_degrees("lomax", lomax)?,
        }),
        ("bbox", _) => bail!("usage: bbox <lamin> <lomin> <lamax> <lomax>"),
        ("refresh", []) => Command::Refresh,
        ("status", []) => Command::Status,
        ("dismiss", []) => Command::Dismiss,
        ("help", _) | ("?", _) => Command::Help,
        ("quit", []) | ("exit", []) => Command::Quit,
        (other, _) => bail!("unknown command `{}`", other),
    };
    Ok(command)
}

fn parse_degrees(name: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("{} must be a number, got `{}`", name, raw))
}

pub async fn execute(command: Command, orchestrator: &Arc<PollOrchestrator>) -> ControlFlow<()> {
    let session = orchestrator.session();
    match command {
        Command::Login(credentials) => {
            session.login(credentials).await;
            orchestrator.trigger();
        }
        Command::Bbox(candidate) => {
            if let Err(e) = session.bbox().apply(candidate) {
                tracing::debug!("Keeping previous bounding box after rejected edit: {}", e);
            }
        }
        Command::Refresh => orchestrator.trigger(),
        Command::Status => {
            let status = session.status().await;
            match serde_json::to_string(&status) {
                Ok(json) => tracing::info!("status {}", json),
                Err(e) => tracing::warn!("Failed to encode status: {}", e),
            }
        }
        Command::Dismiss => session.dismiss_error().await,
        Command::Help => tracing::info!("{}", HELP),
        Command::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

/// Forward stdin lines from a dedicated thread. A blocking stdin read on
/// the runtime would hold up shutdown until the next keypress.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Execute commands until `quit`, end of input, or shutdown. Sends shutdown
/// on `quit`.
pub async fn run_command_loop(
    mut lines: mpsc::Receiver<String>,
    orchestrator: Arc<PollOrchestrator>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown = shutdown_tx.subscribe();

    loop {
        let line = tokio::select! {
            _ = shutdown.recv() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            tracing::debug!("Control input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(command) => {
                if execute(command, &orchestrator).await.is_break() {
                    let _ = shutdown_tx.send(());
                    break;
                }
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
}
