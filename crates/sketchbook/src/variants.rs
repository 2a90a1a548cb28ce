use crate::clock::{local_time_label, unix_now_ms};
use crate::json_io::{read_json_or_default, update_json, write_atomic};
use crate::layout::{Layout, SOURCE_EXTENSION};
use crate::model::{BinItem, Variant, VariantIndex};
use crate::naming::{validate_id, variant_id, variant_seq};
use crate::recycle_bin;
use crate::{Result, SketchbookError};
use std::fs;
use std::io::ErrorKind;

/// Staged snapshots ("stashes") of a sketch's main source.
#[derive(Debug, Clone, Copy)]
pub struct VariantStore<'a> {
    layout: &'a Layout,
}

impl<'a> VariantStore<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Variants in staging order; empty when nothing was staged.
    pub fn list(&self, sketch_id: &str) -> Result<Vec<Variant>> {
        validate_id("sketch", sketch_id)?;
        let index: VariantIndex = read_json_or_default(&self.layout.variants_index(sketch_id))?;
        Ok(index.variants)
    }

    /// Copies the current main source into a new `v<N>` snapshot.
    pub fn stage(&self, sketch_id: &str, name: Option<&str>) -> Result<Variant> {
        validate_id("sketch", sketch_id)?;
        let main = self.layout.main_source(sketch_id);
        if !main.is_file() {
            return Err(SketchbookError::NotFound(format!("sketch '{sketch_id}'")));
        }

        update_json(
            &self.layout.variants_index(sketch_id),
            |index: &mut VariantIndex| {
                let seq = self.next_seq(sketch_id, index)?;
                let id = variant_id(seq);
                fs::create_dir_all(self.layout.variants_dir(sketch_id))?;
                fs::copy(&main, self.layout.variant_source(sketch_id, &id))?;

                let name = name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| default_variant_name(seq));
                let variant = Variant {
                    id,
                    name,
                    timestamp: unix_now_ms(),
                };
                index.variants.push(variant.clone());
                index.next_seq = Some(seq + 1);
                log::info!("Staged {sketch_id}/{} as '{}'", variant.id, variant.name);
                Ok(variant)
            },
        )
    }

    /// Never hands out an id seen before, even when the counter is missing
    /// from an older index.
    fn next_seq(&self, sketch_id: &str, index: &VariantIndex) -> Result<u64> {
        let from_index = index
            .variants
            .iter()
            .filter_map(|v| variant_seq(&v.id))
            .max()
            .unwrap_or(0);
        let from_files = self.max_snapshot_seq(sketch_id)?;
        let from_bin = recycle_bin::max_binned_variant_seq(self.layout, sketch_id)?;
        let observed = from_index.max(from_files).max(from_bin) + 1;
        Ok(index.next_seq.unwrap_or(1).max(observed))
    }

    fn max_snapshot_seq(&self, sketch_id: &str) -> Result<u64> {
        let entries = match fs::read_dir(self.layout.variants_dir(sketch_id)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut max = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
                continue;
            }
            if let Some(seq) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(variant_seq)
            {
                max = max.max(seq);
            }
        }
        Ok(max)
    }

    pub fn load(&self, sketch_id: &str, variant_id: &str) -> Result<String> {
        validate_ids(sketch_id, variant_id)?;
        fs::read_to_string(self.layout.variant_source(sketch_id, variant_id)).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                missing_variant(sketch_id, variant_id)
            } else {
                err.into()
            }
        })
    }

    /// Overwrites an existing snapshot in place. Does not create new snapshots.
    pub fn save(&self, sketch_id: &str, variant_id: &str, code: &str) -> Result<()> {
        validate_ids(sketch_id, variant_id)?;
        let path = self.layout.variant_source(sketch_id, variant_id);
        if !path.is_file() {
            return Err(missing_variant(sketch_id, variant_id));
        }
        write_atomic(&path, code.as_bytes())
    }

    pub fn rename(&self, sketch_id: &str, variant_id: &str, new_name: &str) -> Result<Variant> {
        validate_ids(sketch_id, variant_id)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(SketchbookError::InvalidName(
                "variant name cannot be empty".to_string(),
            ));
        }
        let index_path = self.layout.variants_index(sketch_id);
        if !index_path.is_file() {
            return Err(missing_variant(sketch_id, variant_id));
        }
        update_json(&index_path, |index: &mut VariantIndex| {
            let variant = index
                .variants
                .iter_mut()
                .find(|v| v.id == variant_id)
                .ok_or_else(|| missing_variant(sketch_id, variant_id))?;
            variant.name = new_name.to_string();
            Ok(variant.clone())
        })
    }

    /// Moves the snapshot into the bin and drops it from the index.
    pub fn soft_delete(&self, sketch_id: &str, variant_id: &str) -> Result<BinItem> {
        recycle_bin::stash_variant(self.layout, sketch_id, variant_id)
    }

    /// Overwrites the sketch's main source with the snapshot. Unstaged edits to
    /// the main source are lost.
    pub fn restore(&self, sketch_id: &str, variant_id: &str) -> Result<()> {
        let code = self.load(sketch_id, variant_id)?;
        if !self.layout.sketch_dir(sketch_id).is_dir() {
            return Err(SketchbookError::NotFound(format!("sketch '{sketch_id}'")));
        }
        write_atomic(&self.layout.main_source(sketch_id), code.as_bytes())?;
        log::info!("Restored {sketch_id} main source from {variant_id}");
        Ok(())
    }

    /// Stages the current main source as `Backup before <variantId>`, then restores.
    pub fn restore_with_backup(&self, sketch_id: &str, variant_id: &str) -> Result<Variant> {
        validate_ids(sketch_id, variant_id)?;
        if !self.layout.variant_source(sketch_id, variant_id).is_file() {
            return Err(missing_variant(sketch_id, variant_id));
        }
        let backup = self.stage(sketch_id, Some(&format!("Backup before {variant_id}")))?;
        self.restore(sketch_id, variant_id)?;
        Ok(backup)
    }
}

fn default_variant_name(seq: u64) -> String {
    format!("Stash {seq} · {}", local_time_label())
}

fn validate_ids(sketch_id: &str, variant_id: &str) -> Result<()> {
    validate_id("sketch", sketch_id)?;
    validate_id("variant", variant_id)
}

fn missing_variant(sketch_id: &str, variant_id: &str) -> SketchbookError {
    SketchbookError::NotFound(format!("variant '{variant_id}' of sketch '{sketch_id}'"))
}
