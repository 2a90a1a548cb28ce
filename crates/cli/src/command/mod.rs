pub mod domain;
mod services;

pub use domain::{classify_error, CommandAction, CommandRequest, CommandResponse, ResponseMeta};

use crate::config::AppConfig;
use anyhow::{Context, Result};
use entropic_runtime::{EventSink, SketchRunner};
use entropic_sketchbook::Sketchbook;
use services::Services;
use std::sync::Arc;
use std::time::Instant;

pub struct CommandHandler {
    services: Services,
    runner: Arc<SketchRunner>,
}

impl CommandHandler {
    /// Opens the sketchbook and purges expired bin entries. With `events`
    /// set, `run_sketch` streams to that sink and returns right after launch.
    pub fn new(config: &AppConfig, events: Option<EventSink>) -> Result<Self> {
        let book = Sketchbook::open(config.layout()).with_context(|| {
            format!(
                "Failed to open sketchbook at {}",
                config.layout().root().display()
            )
        })?;
        match book.bin().sweep_expired() {
            Ok(report) if !report.is_empty() => log::info!(
                "Bin sweep purged {} expired and {} orphaned entries",
                report.purged.len(),
                report.orphaned.len()
            ),
            Ok(_) => {}
            Err(err) => log::warn!("Bin sweep failed: {err}"),
        }

        let book = Arc::new(book);
        let runner = Arc::new(SketchRunner::new(config.locator(), config.run_config()));
        Ok(Self {
            services: Services::new(book, runner.clone(), events),
            runner,
        })
    }

    pub async fn execute(&self, request: CommandRequest) -> CommandResponse {
        let started = Instant::now();
        let CommandRequest {
            action,
            payload,
            id,
        } = request;
        log::debug!("Executing {}", action.as_str());

        let result = self.services.route(action, payload).await;
        let meta = ResponseMeta {
            duration_ms: Some(started.elapsed().as_millis() as u64),
        };
        let response = match result {
            Ok(outcome) => CommandResponse::ok(outcome.data, meta),
            Err(err) => {
                let envelope = classify_error(&err);
                log::debug!("{} failed: {:#}", action.as_str(), err);
                CommandResponse::failure(envelope, meta)
            }
        };
        response.with_id(id)
    }

    /// Stops a sketch still running at the end of a session.
    pub async fn shutdown(&self) {
        if self.runner.stop().await {
            log::info!("Stopped running sketch on shutdown");
        }
    }
}
