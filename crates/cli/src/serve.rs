//! `entropic serve`: newline-delimited JSON over stdio.
//!
//! Each input line is a `CommandRequest`; each output line is either a
//! `CommandResponse` or a `SessionEvent` (tagged with `"event"`). Requests
//! are handled in order. A single writer task owns stdout so responses and
//! sketch output never interleave within a line.

use crate::command::{
    classify_error, CommandHandler, CommandRequest, CommandResponse, ResponseMeta,
};
use crate::config::AppConfig;
use crate::print_stdout;
use anyhow::{Context, Result};
use entropic_protocol::{serialize_json, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub async fn run(config: &AppConfig) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    let handler = CommandHandler::new(config, Some(event_tx))?;
    let writer = tokio::spawn(write_lines(line_rx, event_rx));
    log::info!("Serving Command API on stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read request from stdin")?
    {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<CommandRequest>(&line) {
            Ok(request) => handler.execute(request).await,
            Err(err) => {
                log::debug!("Rejected request line: {err}");
                CommandResponse::failure(
                    classify_error(&anyhow::Error::new(err)),
                    ResponseMeta::default(),
                )
            }
        };
        if line_tx.send(serialize_json(&response)?).is_err() {
            break;
        }
    }

    log::info!("stdin closed, shutting down");
    handler.shutdown().await;
    drop(handler);
    drop(line_tx);
    writer.await.context("stdout writer task failed")??;
    Ok(())
}

async fn write_lines(
    mut lines: mpsc::UnboundedReceiver<String>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    loop {
        let text = tokio::select! {
            Some(line) = lines.recv() => line,
            Some(event) = events.recv() => serialize_json(&event)?,
            else => break,
        };
        print_stdout(&text)?;
    }
    Ok(())
}
