//! services/waypoints/src/bin/waypoints.rs
//!
//! A headless host for the waypoint engine. Reads bridge lines (map messages and
//! UI commands) from stdin and writes host messages and notices to stdout, one
//! JSON object per line. Logs go to stderr.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypoints_lib::{
    adapters::{HttpWaypointAdapter, SessionIdentity},
    bridge::{protocol::UiNotice, BridgeHost, ChannelSurface},
    config::Config,
    engine::WaypointEngine,
    error::ClientError,
};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Talking to {}", config.api_url);

    // --- 2. Session & Adapters ---
    let identity = Arc::new(SessionIdentity::new());
    if let Some(token) = &config.token {
        if let Err(e) = identity.sign_in(token) {
            warn!("Ignoring WAYPOINT_TOKEN: {}", e);
        }
    }

    let api = Arc::new(HttpWaypointAdapter::new(
        config.api_url.clone(),
        config.campus_slug.clone(),
        config.http_timeout,
        identity.clone(),
    )?);

    // --- 3. Engine & Bridge ---
    let (surface, mut map_rx) = ChannelSurface::new();
    let engine = WaypointEngine::new(
        api.clone(),
        api,
        identity.clone(),
        Arc::new(surface),
        config.engine_settings(),
    );
    let host = BridgeHost::new(engine.clone(), identity);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<UiNotice>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            tokio::select! {
                Some(message) = map_rx.recv() => write_line(&mut stdout, &message).await?,
                Some(notice) = notice_rx.recv() => write_line(&mut stdout, &notice).await?,
                else => break,
            }
        }
        Ok::<(), ClientError>(())
    });

    if let Err(e) = engine.refresh().await {
        warn!("Initial refresh failed: {}", e);
    }

    // --- 4. Main Line Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let host = host.clone();
        let notices = notice_tx.clone();
        tokio::spawn(async move {
            let notice = match host.handle_line(&line).await {
                Ok(notice) => notice,
                Err(e) => {
                    warn!("Rejected bridge line: {}", e);
                    Some(UiNotice::Error {
                        message: e.to_string(),
                    })
                }
            };
            if let Some(notice) = notice {
                let _ = notices.send(notice);
            }
        });
    }

    // --- 5. Cleanup ---
    info!("Input closed; shutting down.");
    engine.shutdown();
    drop(host);
    drop(engine);
    drop(notice_tx);

    match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ClientError::Internal(format!("writer task failed: {}", e))),
        Err(_) => {
            error!("Timed out flushing pending output.");
            Ok(())
        }
    }
}

async fn write_line<T: Serialize>(
    stdout: &mut tokio::io::Stdout,
    value: &T,
) -> Result<(), ClientError> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}
