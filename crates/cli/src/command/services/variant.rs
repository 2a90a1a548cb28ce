use crate::command::domain::{
    parse_payload, CommandOutcome, RenameVariantPayload, RestoreVariantPayload,
    SaveVariantPayload, SketchRefPayload, StageVariantPayload, VariantRefPayload,
};
use anyhow::Result;
use entropic_sketchbook::Sketchbook;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) struct VariantService {
    book: Arc<Sketchbook>,
}

impl VariantService {
    pub fn new(book: Arc<Sketchbook>) -> Self {
        Self { book }
    }

    pub fn list(&self, payload: Value) -> Result<CommandOutcome> {
        let SketchRefPayload { sketch_id } = parse_payload(payload)?;
        let variants = self.book.variants().list(&sketch_id)?;
        CommandOutcome::from_value(json!({ "sketch_id": sketch_id, "variants": variants }))
    }

    pub fn stage(&self, payload: Value) -> Result<CommandOutcome> {
        let StageVariantPayload { sketch_id, name } = parse_payload(payload)?;
        let variant = self.book.variants().stage(&sketch_id, name.as_deref())?;
        CommandOutcome::from_value(json!({ "variant": variant }))
    }

    pub fn load(&self, payload: Value) -> Result<CommandOutcome> {
        let VariantRefPayload {
            sketch_id,
            variant_id,
        } = parse_payload(payload)?;
        let code = self.book.variants().load(&sketch_id, &variant_id)?;
        CommandOutcome::from_value(json!({
            "sketch_id": sketch_id,
            "variant_id": variant_id,
            "code": code,
        }))
    }

    pub fn save(&self, payload: Value) -> Result<CommandOutcome> {
        let SaveVariantPayload {
            sketch_id,
            variant_id,
            code,
        } = parse_payload(payload)?;
        self.book.variants().save(&sketch_id, &variant_id, &code)?;
        CommandOutcome::from_value(json!({ "sketch_id": sketch_id, "variant_id": variant_id }))
    }

    pub fn rename(&self, payload: Value) -> Result<CommandOutcome> {
        let RenameVariantPayload {
            sketch_id,
            variant_id,
            new_name,
        } = parse_payload(payload)?;
        let variant = self
            .book
            .variants()
            .rename(&sketch_id, &variant_id, &new_name)?;
        CommandOutcome::from_value(json!({ "variant": variant }))
    }

    pub fn delete(&self, payload: Value) -> Result<CommandOutcome> {
        let VariantRefPayload {
            sketch_id,
            variant_id,
        } = parse_payload(payload)?;
        let item = self.book.variants().soft_delete(&sketch_id, &variant_id)?;
        CommandOutcome::from_value(json!({ "item": item }))
    }

    /// Overwrites the main source; with `backup` the previous source is staged first.
    pub fn restore(&self, payload: Value) -> Result<CommandOutcome> {
        let RestoreVariantPayload {
            sketch_id,
            variant_id,
            backup,
        } = parse_payload(payload)?;
        let variants = self.book.variants();
        let backup = if backup {
            Some(variants.restore_with_backup(&sketch_id, &variant_id)?)
        } else {
            variants.restore(&sketch_id, &variant_id)?;
            None
        };
        CommandOutcome::from_value(json!({
            "sketch_id": sketch_id,
            "variant_id": variant_id,
            "backup": backup,
        }))
    }
}
