use crate::clock::{modified_ms, unix_now_ms, MS_PER_DAY};
use crate::json_io::{acquire_index_lock, read_json_or_default, write_json_pretty};
use crate::layout::Layout;
use crate::model::{BinIndex, BinItem, BinItemKey, BinItemKind, Variant, VariantIndex};
use crate::naming::{validate_id, variant_seq};
use crate::{Result, SketchbookError};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const BIN_RETENTION_DAYS: u64 = 30;
pub const BIN_RETENTION_MS: u64 = BIN_RETENTION_DAYS * MS_PER_DAY;

/// Result of restoring or purging one entry. `file_missing` is set when the
/// backing file had already vanished and only the index entry was dropped.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BinOutcome {
    pub item: BinItem,
    pub file_missing: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries older than the retention window, removed together with their files.
    pub purged: Vec<BinItem>,
    /// Entries dropped because their backing file no longer exists.
    pub orphaned: Vec<BinItem>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.purged.is_empty() && self.orphaned.is_empty()
    }
}

/// The shared recycle bin under `Entropic/.bin`.
///
/// Lock order: the bin index lock is always taken before any per-sketch
/// variant index lock.
#[derive(Debug, Clone, Copy)]
pub struct Bin<'a> {
    layout: &'a Layout,
}

impl<'a> Bin<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Entries in the order they were binned.
    pub fn list(&self) -> Result<Vec<BinItem>> {
        let index: BinIndex = read_json_or_default(&self.layout.bin_index())?;
        Ok(index.items)
    }

    pub fn restore(&self, key: &BinItemKey) -> Result<BinOutcome> {
        let index_path = self.layout.bin_index();
        let _lock = acquire_index_lock(&index_path)?;
        let mut index: BinIndex = read_json_or_default(&index_path)?;
        let pos = resolve(&index, key)?;
        let item = index.items[pos].clone();

        let file_missing = match item.kind {
            BinItemKind::Sketch => self.restore_sketch(&item)?,
            BinItemKind::Variant => self.restore_variant(&item)?,
        };

        index.items.remove(pos);
        write_json_pretty(&index_path, &index)?;
        Ok(BinOutcome { item, file_missing })
    }

    fn restore_sketch(&self, item: &BinItem) -> Result<bool> {
        let dest = self.layout.sketch_dir(&item.id);
        if dest.exists() {
            return Err(SketchbookError::Conflict(format!(
                "an active sketch named '{}' already exists",
                item.id
            )));
        }
        let src = self.layout.binned_sketch(&item.id);
        if !src.exists() {
            log::warn!("Bin entry for sketch {} has no backing directory", item.id);
            return Ok(true);
        }
        fs::create_dir_all(self.layout.sketches_dir())?;
        fs::rename(&src, &dest)?;
        log::info!("Restored sketch {} from bin", item.id);
        Ok(false)
    }

    fn restore_variant(&self, item: &BinItem) -> Result<bool> {
        let sketch_id = owning_sketch(item)?;
        validate_id("sketch", sketch_id)?;
        if !self.layout.sketch_dir(sketch_id).is_dir() {
            return Err(SketchbookError::NotFound(format!(
                "sketch '{sketch_id}' for variant '{}'",
                item.id
            )));
        }

        let variants_path = self.layout.variants_index(sketch_id);
        let _lock = acquire_index_lock(&variants_path)?;
        let mut variants: VariantIndex = read_json_or_default(&variants_path)?;
        let dest = self.layout.variant_source(sketch_id, &item.id);
        if dest.exists() || variants.variants.iter().any(|v| v.id == item.id) {
            return Err(SketchbookError::Conflict(format!(
                "variant '{}' is already active in sketch '{sketch_id}'",
                item.id
            )));
        }

        let src = self.layout.binned_variant(sketch_id, &item.id);
        if !src.is_file() {
            log::warn!(
                "Bin entry for variant {sketch_id}/{} has no backing file",
                item.id
            );
            return Ok(true);
        }

        fs::create_dir_all(self.layout.variants_dir(sketch_id))?;
        fs::rename(&src, &dest)?;
        variants.variants.push(Variant {
            id: item.id.clone(),
            name: item.name.clone(),
            timestamp: item.original_timestamp.unwrap_or(item.deleted_at),
        });
        variants.variants.sort_by(|a, b| {
            let a_seq = variant_seq(&a.id).unwrap_or(u64::MAX);
            let b_seq = variant_seq(&b.id).unwrap_or(u64::MAX);
            a_seq.cmp(&b_seq).then_with(|| a.id.cmp(&b.id))
        });
        if let Some(seq) = variant_seq(&item.id) {
            let next = variants.next_seq.unwrap_or(1).max(seq + 1);
            variants.next_seq = Some(next);
        }
        write_json_pretty(&variants_path, &variants)?;
        log::info!("Restored variant {sketch_id}/{} from bin", item.id);
        Ok(false)
    }

    pub fn permanent_delete(&self, key: &BinItemKey) -> Result<BinOutcome> {
        let index_path = self.layout.bin_index();
        let _lock = acquire_index_lock(&index_path)?;
        let mut index: BinIndex = read_json_or_default(&index_path)?;
        let pos = resolve(&index, key)?;
        let item = index.items.remove(pos);

        let file_missing = !remove_path(&self.backing_path(&item)?)?;
        if file_missing {
            log::warn!("Bin entry {} {} had no backing file", item.kind, item.id);
        }
        write_json_pretty(&index_path, &index)?;
        log::info!("Permanently deleted {} {}", item.kind, item.id);
        Ok(BinOutcome { item, file_missing })
    }

    /// Purges every entry and its file. Returns what was removed.
    pub fn empty(&self) -> Result<Vec<BinItem>> {
        let index_path = self.layout.bin_index();
        let _lock = acquire_index_lock(&index_path)?;
        let mut index: BinIndex = read_json_or_default(&index_path)?;
        for item in &index.items {
            match self.backing_path(item) {
                Ok(path) => {
                    remove_path(&path)?;
                }
                Err(err) => log::warn!("Skipping file removal for {}: {err}", item.id),
            }
        }
        let removed = std::mem::take(&mut index.items);
        write_json_pretty(&index_path, &index)?;
        log::info!("Emptied bin ({} items)", removed.len());
        Ok(removed)
    }

    pub fn sweep_expired(&self) -> Result<SweepReport> {
        self.sweep_expired_at(unix_now_ms())
    }

    /// Purges entries with `now_ms - deleted_at > 30 days` and drops entries
    /// whose backing file is gone. An entry exactly 30 days old is kept.
    pub fn sweep_expired_at(&self, now_ms: u64) -> Result<SweepReport> {
        let index_path = self.layout.bin_index();
        if !index_path.exists() {
            return Ok(SweepReport::default());
        }
        let _lock = acquire_index_lock(&index_path)?;
        let mut index: BinIndex = read_json_or_default(&index_path)?;
        let mut report = SweepReport::default();
        let mut kept = Vec::with_capacity(index.items.len());

        for item in index.items.drain(..) {
            let path = self.backing_path(&item).ok();
            let expired = now_ms.saturating_sub(item.deleted_at) > BIN_RETENTION_MS;
            if expired {
                if let Some(path) = &path {
                    remove_path(path)?;
                }
                report.purged.push(item);
            } else if path.as_deref().map_or(true, |p| !p.exists()) {
                log::warn!("Dropping bin entry {} {}: backing file missing", item.kind, item.id);
                report.orphaned.push(item);
            } else {
                kept.push(item);
            }
        }

        if !report.is_empty() {
            index.items = kept;
            write_json_pretty(&index_path, &index)?;
            log::info!(
                "Bin sweep purged {} expired and {} orphaned entries",
                report.purged.len(),
                report.orphaned.len()
            );
        }
        Ok(report)
    }

    fn backing_path(&self, item: &BinItem) -> Result<PathBuf> {
        match item.kind {
            BinItemKind::Sketch => Ok(self.layout.binned_sketch(&item.id)),
            BinItemKind::Variant => Ok(self.layout.binned_variant(owning_sketch(item)?, &item.id)),
        }
    }
}

/// Moves an active sketch directory into the bin, replacing any binned sketch
/// with the same id.
pub(crate) fn stash_sketch(
    layout: &Layout,
    id: &str,
    original_timestamp: Option<u64>,
) -> Result<BinItem> {
    let index_path = layout.bin_index();
    let _lock = acquire_index_lock(&index_path)?;
    let mut index: BinIndex = read_json_or_default(&index_path)?;

    let key = BinItemKey::sketch(id);
    let target = layout.binned_sketch(id);
    if remove_path(&target)? {
        log::debug!("Replaced previously binned sketch {id}");
    }
    index.items.retain(|item| !item.matches(&key));

    fs::rename(layout.sketch_dir(id), &target)?;
    let item = BinItem {
        id: id.to_string(),
        kind: BinItemKind::Sketch,
        name: id.to_string(),
        sketch_id: None,
        deleted_at: unix_now_ms(),
        original_timestamp,
    };
    index.items.push(item.clone());
    write_json_pretty(&index_path, &index)?;
    log::info!("Moved sketch {id} to bin");
    Ok(item)
}

/// Moves a variant snapshot into the bin as `<sketchId>_<variantId>.pde` and
/// drops it from the sketch's variant index.
pub(crate) fn stash_variant(layout: &Layout, sketch_id: &str, variant_id: &str) -> Result<BinItem> {
    validate_id("sketch", sketch_id)?;
    validate_id("variant", variant_id)?;
    if !layout.sketch_dir(sketch_id).is_dir() {
        return Err(SketchbookError::NotFound(format!("sketch '{sketch_id}'")));
    }

    let bin_path = layout.bin_index();
    let variants_path = layout.variants_index(sketch_id);
    let _bin_lock = acquire_index_lock(&bin_path)?;
    let _variants_lock = acquire_index_lock(&variants_path)?;
    let mut bin: BinIndex = read_json_or_default(&bin_path)?;
    let mut variants: VariantIndex = read_json_or_default(&variants_path)?;

    let snapshot = layout.variant_source(sketch_id, variant_id);
    if !snapshot.is_file() {
        return Err(SketchbookError::NotFound(format!(
            "variant '{variant_id}' of sketch '{sketch_id}'"
        )));
    }
    let (name, original_timestamp) = match variants.variants.iter().find(|v| v.id == variant_id) {
        Some(v) => (v.name.clone(), v.timestamp),
        None => (
            variant_id.to_string(),
            modified_ms(&fs::metadata(&snapshot)?),
        ),
    };

    let key = BinItemKey::variant(sketch_id, variant_id);
    let target = layout.binned_variant(sketch_id, variant_id);
    remove_path(&target)?;
    bin.items.retain(|item| !item.matches(&key));
    fs::create_dir_all(layout.bin_dir())?;
    fs::rename(&snapshot, &target)?;

    variants.variants.retain(|v| v.id != variant_id);
    if let Some(seq) = variant_seq(variant_id) {
        let next = variants.next_seq.unwrap_or(1).max(seq + 1);
        variants.next_seq = Some(next);
    }

    let item = BinItem {
        id: variant_id.to_string(),
        kind: BinItemKind::Variant,
        name,
        sketch_id: Some(sketch_id.to_string()),
        deleted_at: unix_now_ms(),
        original_timestamp: Some(original_timestamp),
    };
    bin.items.push(item.clone());
    write_json_pretty(&bin_path, &bin)?;
    write_json_pretty(&variants_path, &variants)?;
    log::info!("Moved variant {sketch_id}/{variant_id} to bin");
    Ok(item)
}

/// Points binned variants of `old_id` at `new_id`, moving their composite
/// files along. Returns how many entries moved.
pub(crate) fn rehome_variants(layout: &Layout, old_id: &str, new_id: &str) -> Result<usize> {
    let bin_path = layout.bin_index();
    if !bin_path.exists() {
        return Ok(0);
    }
    let _lock = acquire_index_lock(&bin_path)?;
    let mut bin: BinIndex = read_json_or_default(&bin_path)?;

    let mut moved = 0;
    for item in bin.items.iter_mut().filter(|item| {
        item.kind == BinItemKind::Variant && item.sketch_id.as_deref() == Some(old_id)
    }) {
        let src = layout.binned_variant(old_id, &item.id);
        let dest = layout.binned_variant(new_id, &item.id);
        if src.is_file() {
            remove_path(&dest)?;
            fs::rename(&src, &dest)?;
        } else {
            log::warn!("Bin entry for variant {old_id}/{} has no backing file", item.id);
        }
        item.sketch_id = Some(new_id.to_string());
        moved += 1;
    }

    if moved > 0 {
        write_json_pretty(&bin_path, &bin)?;
        log::debug!("Re-pointed {moved} binned variants from {old_id} to {new_id}");
    }
    Ok(moved)
}

/// Highest variant sequence number held in the bin for `sketch_id`.
pub(crate) fn max_binned_variant_seq(layout: &Layout, sketch_id: &str) -> Result<u64> {
    let index: BinIndex = read_json_or_default(&layout.bin_index())?;
    Ok(index
        .items
        .iter()
        .filter(|item| {
            item.kind == BinItemKind::Variant && item.sketch_id.as_deref() == Some(sketch_id)
        })
        .filter_map(|item| variant_seq(&item.id))
        .max()
        .unwrap_or(0))
}

fn owning_sketch(item: &BinItem) -> Result<&str> {
    item.sketch_id.as_deref().ok_or_else(|| {
        SketchbookError::Other(format!("bin entry for variant '{}' has no sketchId", item.id))
    })
}

fn resolve(index: &BinIndex, key: &BinItemKey) -> Result<usize> {
    validate_id(key.kind.as_str(), &key.id)?;
    if let Some(sketch_id) = &key.sketch_id {
        validate_id("sketch", sketch_id)?;
    }
    let hits: Vec<usize> = index
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.matches(key))
        .map(|(pos, _)| pos)
        .collect();
    match hits.as_slice() {
        [] => Err(SketchbookError::NotFound(format!(
            "{} '{}' is not in the bin",
            key.kind, key.id
        ))),
        [pos] => Ok(*pos),
        many => Err(SketchbookError::InvalidRequest(format!(
            "{} binned variants are named '{}'; pass sketch_id to pick one",
            many.len(),
            key.id
        ))),
    }
}

/// Removes a file or directory tree. Returns false when nothing was there.
fn remove_path(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    log::debug!("Removed {}", path.display());
    Ok(true)
}
