use crate::command::domain::{
    parse_payload, CheckLibrariesPayload, CommandOutcome, RunFailed, RunSketchPayload,
};
use anyhow::{Context, Result};
use entropic_protocol::SessionEvent;
use entropic_runtime::{check_libraries, ensure_library_dir, EventSink, SketchRunner};
use entropic_sketchbook::{Sketchbook, SketchbookError, UNTITLED_SKETCH_ID};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct RuntimeService {
    book: Arc<Sketchbook>,
    runner: Arc<SketchRunner>,
    /// Present in `serve` mode: run output is pushed there instead of collected.
    events: Option<EventSink>,
}

impl RuntimeService {
    pub fn new(
        book: Arc<Sketchbook>,
        runner: Arc<SketchRunner>,
        events: Option<EventSink>,
    ) -> Self {
        Self {
            book,
            runner,
            events,
        }
    }

    pub fn check(&self, _payload: Value) -> Result<CommandOutcome> {
        let status = self.runner.locator().status();
        log::debug!(
            "Toolchain installed={} compiler={}",
            status.installed,
            status.has_compiler
        );
        CommandOutcome::from_value(status)
    }

    pub async fn run(&self, payload: Value) -> Result<CommandOutcome> {
        let RunSketchPayload {
            code,
            sketch_id,
            name,
        } = parse_payload(payload)?;
        let (code, sketch_name) = match (code, sketch_id) {
            (Some(code), sketch_id) => {
                let sketch_name = name
                    .or(sketch_id)
                    .unwrap_or_else(|| UNTITLED_SKETCH_ID.to_string());
                (code, sketch_name)
            }
            (None, Some(sketch_id)) => {
                let code = self.book.sketches().load(&sketch_id)?;
                (code, name.unwrap_or(sketch_id))
            }
            (None, None) => {
                return Err(SketchbookError::InvalidRequest(
                    "run_sketch needs either `code` or `sketch_id`".to_string(),
                )
                .into())
            }
        };

        if let Some(events) = &self.events {
            let started = self.runner.run(&code, &sketch_name, events.clone()).await?;
            return CommandOutcome::from_value(json!({ "started": started }));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = match self.runner.run(&code, &sketch_name, tx).await {
            Ok(started) => started,
            Err(source) => {
                let mut output = Vec::new();
                while let Ok(event) = rx.try_recv() {
                    output.push(event);
                }
                return Err(RunFailed {
                    source,
                    output: serde_json::to_value(output)?,
                }
                .into());
            }
        };

        let mut output = Vec::new();
        let mut exit = None;
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::SketchExited { .. } => {
                    exit = Some(event);
                    break;
                }
                line => output.push(line),
            }
        }
        CommandOutcome::from_value(json!({
            "started": started,
            "output": output,
            "exit": exit,
        }))
    }

    pub async fn stop(&self, _payload: Value) -> Result<CommandOutcome> {
        let stopped = self.runner.stop().await;
        CommandOutcome::from_value(json!({ "stopped": stopped }))
    }

    pub fn check_libraries(&self, payload: Value) -> Result<CommandOutcome> {
        let CheckLibrariesPayload { code } = parse_payload(payload)?;
        let library_dir = self.runner.locator().processing_dir();
        let libraries = check_libraries(&library_dir, &code);
        CommandOutcome::from_value(json!({
            "libraries": libraries,
            "library_dir": library_dir,
        }))
    }

    pub fn library_dir(&self, _payload: Value) -> Result<CommandOutcome> {
        let dir = self.runner.locator().processing_dir();
        let path = ensure_library_dir(&dir)
            .with_context(|| format!("Failed to create library directory {}", dir.display()))?;
        CommandOutcome::from_value(json!({ "path": path }))
    }
}
