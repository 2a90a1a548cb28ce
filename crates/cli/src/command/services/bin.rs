use crate::command::domain::{parse_payload, CommandOutcome};
use anyhow::{Context, Result};
use entropic_sketchbook::{BinItemKey, Sketchbook, BIN_RETENTION_DAYS};
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) struct BinService {
    book: Arc<Sketchbook>,
}

impl BinService {
    pub fn new(book: Arc<Sketchbook>) -> Self {
        Self { book }
    }

    pub fn list(&self, _payload: Value) -> Result<CommandOutcome> {
        let items = self.book.bin().list().context("Failed to read the bin index")?;
        CommandOutcome::from_value(json!({
            "items": items,
            "retention_days": BIN_RETENTION_DAYS,
        }))
    }

    pub fn restore(&self, payload: Value) -> Result<CommandOutcome> {
        let key: BinItemKey = parse_payload(payload)?;
        let outcome = self.book.bin().restore(&key)?;
        CommandOutcome::from_value(outcome)
    }

    pub fn delete(&self, payload: Value) -> Result<CommandOutcome> {
        let key: BinItemKey = parse_payload(payload)?;
        let outcome = self.book.bin().permanent_delete(&key)?;
        CommandOutcome::from_value(outcome)
    }

    pub fn empty(&self, _payload: Value) -> Result<CommandOutcome> {
        let items = self.book.bin().empty()?;
        CommandOutcome::from_value(json!({ "removed": items.len(), "items": items }))
    }

    pub fn sweep(&self, _payload: Value) -> Result<CommandOutcome> {
        let report = self.book.bin().sweep_expired()?;
        CommandOutcome::from_value(report)
    }
}
