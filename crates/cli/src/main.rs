// crates/cli/src/main.rs
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use agentwatch_live::{
    FeedConfig, HttpScanControl, JsonlConnector, LiveSnapshot, ScanControl, SseConnector,
    Supervisor, SupervisorConfig, SupervisorHandle,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "agentwatch", version, about = "Follow autonomous pentest agent runs as they happen")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow a running scan's live feed.
    Watch {
        scan_id: String,
        /// Backend base URL (overrides AGENTWATCH_API_URL).
        #[arg(long)]
        api_url: Option<String>,
        /// Feed token (overrides AGENTWATCH_TOKEN).
        #[arg(long)]
        token: Option<String>,
        /// Print transcript entries and the final snapshot as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Replay a captured feed from a JSON Lines file.
    Replay {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Ask the backend to stop a scan.
    Stop {
        scan_id: String,
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,agentwatch=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = FeedConfig::from_env().context("invalid agentwatch configuration")?;

    match cli.command {
        Command::Watch {
            scan_id,
            api_url,
            token,
            json,
        } => {
            apply_overrides(&mut config, api_url, token);
            let connector = SseConnector::new(&config.api_url, &scan_id)
                .with_token(config.token.clone())
                .with_resume(config.resume_supported);
            info!(scan_id = %scan_id, api_url = %config.api_url, "watching scan");
            let handle = Supervisor::spawn(scan_id, Arc::new(connector), config.supervisor());
            finish(follow(handle, json).await?, json)
        }
        Command::Replay { file, json } => {
            let connector = JsonlConnector::new(&file);
            let supervisor = SupervisorConfig {
                max_reconnects: 0,
                ..config.supervisor()
            };
            let session_id = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "replay".to_string());
            let handle = Supervisor::spawn(session_id, Arc::new(connector), supervisor);
            finish(follow(handle, json).await?, json)
        }
        Command::Stop {
            scan_id,
            api_url,
            token,
        } => {
            apply_overrides(&mut config, api_url, token);
            HttpScanControl::new(&config.api_url, config.token.clone())
                .stop(&scan_id)
                .await
                .with_context(|| format!("failed to stop scan {scan_id}"))?;
            println!("stop requested for {scan_id}; the feed will report when the run halts");
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut FeedConfig, api_url: Option<String>, token: Option<String>) {
    if let Some(url) = api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if token.is_some() {
        config.token = token;
    }
}

/// Print entries as they arrive until the feed is final. Ctrl-C cancels the
/// supervisor (the scan keeps running upstream).
async fn follow(handle: SupervisorHandle, json: bool) -> anyhow::Result<Arc<LiveSnapshot>> {
    let mut rx = handle.subscribe();
    let mut printed = 0usize;
    let mut last_feed = None;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let snapshot = Arc::clone(&rx.borrow_and_update());

        for entry in snapshot.session.transcript.iter_from(printed) {
            if json {
                println!("{}", serde_json::to_string(entry.as_ref())?);
            } else {
                println!("{}", render::render_entry(entry));
            }
        }
        printed = snapshot.session.transcript.len();

        if last_feed != Some(snapshot.feed) {
            last_feed = Some(snapshot.feed);
            if !json {
                if let Some(line) = render::render_feed_state(&snapshot) {
                    eprintln!("-- {line}");
                }
            }
        }

        if snapshot.feed.is_final() {
            return Ok(snapshot);
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(handle.snapshot());
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!(session_id = handle.session_id(), "interrupted, closing feed");
                handle.cancel();
            }
        }
    }
}

fn finish(snapshot: Arc<LiveSnapshot>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot.as_ref())?);
    } else {
        println!();
        println!("{}", render::render_summary(&snapshot));
    }
    Ok(())
}
