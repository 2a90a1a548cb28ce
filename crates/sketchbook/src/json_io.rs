use crate::{Result, SketchbookError};
use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Exclusive advisory lock guarding one JSON index file. Released on drop.
pub(crate) struct IndexLock {
    #[allow(dead_code)]
    file: File,
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path_for_index(index_path: &Path) -> PathBuf {
    index_path.with_extension("lock")
}

pub(crate) fn acquire_index_lock(index_path: &Path) -> Result<IndexLock> {
    let path = lock_path_for_index(index_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| SketchbookError::LockError(format!("open {}: {err}", path.display())))?;

    let start = Instant::now();
    file.lock_exclusive().map_err(|err| {
        SketchbookError::LockError(format!("acquire {}: {err}", path.display()))
    })?;
    let waited_ms = start.elapsed().as_millis();
    if waited_ms > 50 {
        log::debug!("Waited {waited_ms}ms for index lock {}", path.display());
    }

    Ok(IndexLock { file })
}

/// Reads a JSON index, treating a missing or blank file as the empty index.
pub(crate) fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).map_err(|err| {
        SketchbookError::Other(format!("parse index {}: {err}", path.display()))
    })
}

pub(crate) fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Read-modify-write of one index under its lock. Nothing is written when `mutate` fails.
pub(crate) fn update_json<T, R>(path: &Path, mutate: impl FnOnce(&mut T) -> Result<R>) -> Result<R>
where
    T: DeserializeOwned + Serialize + Default,
{
    let _lock = acquire_index_lock(path)?;
    let mut value: T = read_json_or_default(path)?;
    let out = mutate(&mut value)?;
    write_json_pretty(path, &value)?;
    Ok(out)
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| SketchbookError::Other(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("index"),
        std::process::id()
    ));

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        #[serde(default)]
        hits: Vec<u32>,
    }

    #[test]
    fn missing_and_blank_files_read_as_default() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("index.json");
        let value: Counter = read_json_or_default(&path).expect("missing");
        assert_eq!(value, Counter::default());

        std::fs::write(&path, "  \n").expect("write blank");
        let value: Counter = read_json_or_default(&path).expect("blank");
        assert_eq!(value, Counter::default());
    }

    #[test]
    fn update_persists_pretty_json_and_skips_write_on_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("index.json");

        update_json(&path, |c: &mut Counter| {
            c.hits.push(1);
            Ok(())
        })
        .expect("first update");
        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains('\n'), "expected pretty JSON, got {raw}");

        let err = update_json(&path, |c: &mut Counter| -> Result<()> {
            c.hits.push(2);
            Err(SketchbookError::Conflict("nope".into()))
        });
        assert!(err.is_err());

        let value: Counter = read_json_or_default(&path).expect("reread");
        assert_eq!(value.hits, vec![1]);
        assert!(dir.path().join("nested").join("index.lock").exists());
    }

    #[test]
    fn corrupt_index_reports_its_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("write");
        let err = read_json_or_default::<Counter>(&path).expect_err("should fail");
        assert!(err.to_string().contains("broken.json"));
    }
}
