use crate::command::domain::{
    parse_payload, CommandOutcome, CreateSketchPayload, RenameSketchPayload, SaveSketchPayload,
    SketchIdPayload,
};
use anyhow::{Context, Result};
use entropic_sketchbook::Sketchbook;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) struct SketchService {
    book: Arc<Sketchbook>,
}

impl SketchService {
    pub fn new(book: Arc<Sketchbook>) -> Self {
        Self { book }
    }

    pub fn list(&self, _payload: Value) -> Result<CommandOutcome> {
        let sketches = self.book.sketches().list().context("Failed to list sketches")?;
        CommandOutcome::from_value(json!({ "sketches": sketches }))
    }

    pub fn create(&self, payload: Value) -> Result<CommandOutcome> {
        let payload: CreateSketchPayload = parse_payload(payload)?;
        let sketch = self.book.sketches().create(payload.name.as_deref())?;
        CommandOutcome::from_value(json!({ "sketch": sketch }))
    }

    pub fn load(&self, payload: Value) -> Result<CommandOutcome> {
        let SketchIdPayload { id } = parse_payload(payload)?;
        let code = self.book.sketches().load(&id)?;
        CommandOutcome::from_value(json!({ "id": id, "code": code }))
    }

    pub fn save(&self, payload: Value) -> Result<CommandOutcome> {
        let SaveSketchPayload { id, code } = parse_payload(payload)?;
        self.book.sketches().save(&id, &code)?;
        let sketch = self.book.sketches().get(&id)?;
        CommandOutcome::from_value(json!({ "sketch": sketch }))
    }

    pub fn rename(&self, payload: Value) -> Result<CommandOutcome> {
        let RenameSketchPayload { id, new_name } = parse_payload(payload)?;
        let new_id = self.book.sketches().rename(&id, &new_name)?;
        CommandOutcome::from_value(json!({ "old_id": id, "new_id": new_id }))
    }

    pub fn delete(&self, payload: Value) -> Result<CommandOutcome> {
        let SketchIdPayload { id } = parse_payload(payload)?;
        let item = self.book.sketches().soft_delete(&id)?;
        CommandOutcome::from_value(json!({ "item": item }))
    }
}
