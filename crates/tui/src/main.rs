mod renderer;
mod source;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tuneline_core::{MemoryHistory, TimelineConfig, TimelineSession};

use crate::source::DelayedSource;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: tuneline <recent-tracks.json> [user]");
        std::process::exit(1);
    }

    init_logging()?;

    let path = PathBuf::from(&args[1]);
    let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let history = tuneline_core::parsers::parse_auto(&data)
        .with_context(|| format!("decoding {}", path.display()))?;

    let user = args
        .get(2)
        .cloned()
        .or(history.user)
        .unwrap_or_else(|| "unknown".to_string());
    let source = MemoryHistory::new(user.as_str(), history.scrobbles);
    tracing::info!(user = %user, scrobbles = source.len(), "history loaded");

    let config = TimelineConfig::from_env();
    let session = TimelineSession::new(config, user);
    let source = Arc::new(DelayedSource::new(source, fetch_delay()));

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    renderer::render_tui(session, source, runtime.handle().clone())?;
    Ok(())
}

/// Log to `TUNELINE_LOG_FILE` when set. The terminal belongs to the UI, so
/// output is discarded otherwise.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match std::env::var("TUNELINE_LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let file = File::create(&path).with_context(|| format!("opening log file {path}"))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        _ => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

fn fetch_delay() -> Duration {
    std::env::var("TUNELINE_FETCH_DELAY_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_default()
}
