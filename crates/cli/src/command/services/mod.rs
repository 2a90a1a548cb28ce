mod bin;
mod capabilities;
mod runtime;
mod sketch;
mod star;
mod variant;

use crate::command::domain::{CommandAction, CommandOutcome};
use anyhow::Result;
use entropic_runtime::{EventSink, SketchRunner};
use entropic_sketchbook::Sketchbook;
use serde_json::Value;
use std::sync::Arc;

pub struct Services {
    capabilities: capabilities::CapabilitiesService,
    sketch: sketch::SketchService,
    variant: variant::VariantService,
    bin: bin::BinService,
    star: star::StarService,
    runtime: runtime::RuntimeService,
}

impl Services {
    pub fn new(
        book: Arc<Sketchbook>,
        runner: Arc<SketchRunner>,
        events: Option<EventSink>,
    ) -> Self {
        Self {
            capabilities: capabilities::CapabilitiesService,
            sketch: sketch::SketchService::new(book.clone()),
            variant: variant::VariantService::new(book.clone()),
            bin: bin::BinService::new(book.clone()),
            star: star::StarService::new(book.clone()),
            runtime: runtime::RuntimeService::new(book, runner, events),
        }
    }

    pub async fn route(&self, action: CommandAction, payload: Value) -> Result<CommandOutcome> {
        match action {
            CommandAction::Capabilities => self.capabilities.run(payload),
            CommandAction::ListSketches => self.sketch.list(payload),
            CommandAction::CreateSketch => self.sketch.create(payload),
            CommandAction::LoadSketch => self.sketch.load(payload),
            CommandAction::SaveSketch => self.sketch.save(payload),
            CommandAction::RenameSketch => self.sketch.rename(payload),
            CommandAction::DeleteSketch => self.sketch.delete(payload),
            CommandAction::ListVariants => self.variant.list(payload),
            CommandAction::StageVariant => self.variant.stage(payload),
            CommandAction::LoadVariant => self.variant.load(payload),
            CommandAction::SaveVariant => self.variant.save(payload),
            CommandAction::RenameVariant => self.variant.rename(payload),
            CommandAction::DeleteVariant => self.variant.delete(payload),
            CommandAction::RestoreVariant => self.variant.restore(payload),
            CommandAction::ListBin => self.bin.list(payload),
            CommandAction::RestoreBinItem => self.bin.restore(payload),
            CommandAction::DeleteBinItem => self.bin.delete(payload),
            CommandAction::EmptyBin => self.bin.empty(payload),
            CommandAction::SweepBin => self.bin.sweep(payload),
            CommandAction::ListStars => self.star.list(payload),
            CommandAction::ToggleStar => self.star.toggle(payload),
            CommandAction::CheckRuntime => self.runtime.check(payload),
            CommandAction::RunSketch => self.runtime.run(payload).await,
            CommandAction::StopSketch => self.runtime.stop(payload).await,
            CommandAction::CheckLibraries => self.runtime.check_libraries(payload),
            CommandAction::LibraryDir => self.runtime.library_dir(payload),
        }
    }
}
