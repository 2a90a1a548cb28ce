use crate::command::domain::{parse_payload, CommandOutcome, ToggleStarPayload};
use anyhow::Result;
use entropic_sketchbook::Sketchbook;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) struct StarService {
    book: Arc<Sketchbook>,
}

impl StarService {
    pub fn new(book: Arc<Sketchbook>) -> Self {
        Self { book }
    }

    pub fn list(&self, _payload: Value) -> Result<CommandOutcome> {
        let starred = self.book.stars().list()?;
        CommandOutcome::from_value(json!({ "starred": starred }))
    }

    pub fn toggle(&self, payload: Value) -> Result<CommandOutcome> {
        let ToggleStarPayload { id } = parse_payload(payload)?;
        let starred = self.book.stars().toggle(&id)?;
        CommandOutcome::from_value(json!({ "id": id, "starred": starred }))
    }
}
