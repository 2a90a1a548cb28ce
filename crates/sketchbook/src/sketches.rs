use crate::recycle_bin;
use crate::clock::{created_ms, local_today, modified_ms};
use crate::json_io::write_atomic;
use crate::layout::{source_file_name, Layout};
use crate::model::{BinItem, Sketch};
use crate::naming::{auto_sketch_id, sketch_id_for_create, sketch_id_for_rename, validate_id};
use crate::stars::StarIndex;
use crate::{Result, SketchbookError};
use std::fs;
use std::io::ErrorKind;

/// Source written into every freshly created sketch.
pub const DEFAULT_TEMPLATE: &str = "// 欢迎来到创意编程的世界！
// Welcome to the world of creative coding!

void setup() {
  size(800, 600);
  background(30);
}

void draw() {
  // 用鼠标画彩色圆圈
  // Draw colorful circles with mouse
  fill(random(100, 255), random(100, 255), random(100, 255), 150);
  noStroke();
  circle(mouseX, mouseY, random(20, 50));
}
";

/// Active sketches: one directory per sketch holding `<id>.pde`.
#[derive(Debug, Clone, Copy)]
pub struct SketchStore<'a> {
    layout: &'a Layout,
}

impl<'a> SketchStore<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// All active sketches, most recently updated first.
    pub fn list(&self) -> Result<Vec<Sketch>> {
        let dir = self.layout.sketches_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut sketches = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if id.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            match self.describe(&id) {
                Ok(sketch) => sketches.push(sketch),
                Err(SketchbookError::NotFound(_)) => {
                    log::debug!("Skipping {id}: no {}", source_file_name(&id));
                }
                Err(err) => return Err(err),
            }
        }

        sketches.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sketches)
    }

    pub fn exists(&self, id: &str) -> bool {
        validate_id("sketch", id).is_ok() && self.layout.sketch_dir(id).is_dir()
    }

    pub fn get(&self, id: &str) -> Result<Sketch> {
        validate_id("sketch", id)?;
        self.describe(id)
    }

    fn describe(&self, id: &str) -> Result<Sketch> {
        let dir = self.layout.sketch_dir(id);
        let main = self.layout.main_source(id);
        let dir_meta = fs::metadata(&dir).map_err(|err| not_found_or_io(err, id))?;
        let main_meta = fs::metadata(&main).map_err(|err| not_found_or_io(err, id))?;
        Ok(Sketch {
            id: id.to_string(),
            name: id.to_string(),
            created_at: created_ms(&dir_meta),
            updated_at: modified_ms(&dir_meta).max(modified_ms(&main_meta)),
        })
    }

    /// Creates a sketch from the default template. `None` picks the next free
    /// `S_<date>_<n>` id; a name that sanitizes to nothing becomes `Untitled`.
    pub fn create(&self, name: Option<&str>) -> Result<Sketch> {
        let id = match name {
            Some(name) => sketch_id_for_create(name),
            None => auto_sketch_id(local_today(), |candidate| {
                self.layout.sketch_dir(candidate).exists()
            }),
        };

        fs::create_dir_all(self.layout.sketches_dir())?;
        let dir = self.layout.sketch_dir(&id);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(SketchbookError::AlreadyExists(format!("sketch '{id}'")));
            }
            Err(err) => return Err(err.into()),
        }
        fs::write(self.layout.main_source(&id), DEFAULT_TEMPLATE)?;
        log::info!("Created sketch {id}");
        self.describe(&id)
    }

    pub fn load(&self, id: &str) -> Result<String> {
        validate_id("sketch", id)?;
        fs::read_to_string(self.layout.main_source(id)).map_err(|err| not_found_or_io(err, id))
    }

    /// Overwrites the main source. The sketch directory must already exist.
    pub fn save(&self, id: &str, code: &str) -> Result<()> {
        validate_id("sketch", id)?;
        if !self.layout.sketch_dir(id).is_dir() {
            return Err(SketchbookError::NotFound(format!("sketch '{id}'")));
        }
        write_atomic(&self.layout.main_source(id), code.as_bytes())
    }

    /// Renames directory and main source, returning the new id.
    pub fn rename(&self, id: &str, new_name: &str) -> Result<String> {
        validate_id("sketch", id)?;
        let old_dir = self.layout.sketch_dir(id);
        if !old_dir.is_dir() {
            return Err(SketchbookError::NotFound(format!("sketch '{id}'")));
        }
        let new_id = sketch_id_for_rename(new_name)?;
        if new_id == id {
            return Ok(new_id);
        }
        let new_dir = self.layout.sketch_dir(&new_id);
        if new_dir.exists() {
            return Err(SketchbookError::AlreadyExists(format!("sketch '{new_id}'")));
        }

        fs::rename(&old_dir, &new_dir)?;
        let old_main = new_dir.join(source_file_name(id));
        if old_main.exists() {
            fs::rename(&old_main, self.layout.main_source(&new_id))?;
        }
        recycle_bin::rehome_variants(self.layout, id, &new_id)?;
        StarIndex::new(self.layout).replace(id, &new_id)?;
        log::info!("Renamed sketch {id} -> {new_id}");
        Ok(new_id)
    }

    /// Moves the whole sketch directory into the bin.
    pub fn soft_delete(&self, id: &str) -> Result<BinItem> {
        let sketch = self.get(id)?;
        recycle_bin::stash_sketch(self.layout, &sketch.id, Some(sketch.updated_at))
    }
}

fn not_found_or_io(err: std::io::Error, id: &str) -> SketchbookError {
    if err.kind() == ErrorKind::NotFound {
        SketchbookError::NotFound(format!("sketch '{id}'"))
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn layout() -> (TempDir, Layout) {
        let dir = TempDir::new().expect("tempdir");
        let layout = Layout::new(dir.path().join("Entropic"));
        (dir, layout)
    }

    #[test]
    fn create_writes_template_and_rejects_duplicates() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);

        let sketch = store.create(Some("1 Test")).expect("create");
        assert_eq!(sketch.id, "S_1_Test");
        assert_eq!(store.load("S_1_Test").expect("load"), DEFAULT_TEMPLATE);

        let err = store.create(Some("1 Test")).expect_err("duplicate");
        assert!(matches!(err, SketchbookError::AlreadyExists(_)));
    }

    #[test]
    fn auto_named_sketches_do_not_collide() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);
        let a = store.create(None).expect("first");
        let b = store.create(None).expect("second");
        assert!(a.id.starts_with("S_") && a.id.ends_with("_1"), "{}", a.id);
        assert!(b.id.ends_with("_2"), "{}", b.id);

        let untitled = store.create(Some("")).expect("untitled");
        assert_eq!(untitled.id, "Untitled");
    }

    #[test]
    fn list_skips_hidden_and_sourceless_directories() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);
        store.create(Some("Waves")).expect("create");
        fs::create_dir_all(layout.sketches_dir().join("Empty")).expect("mkdir");
        fs::create_dir_all(layout.sketches_dir().join(".hidden")).expect("mkdir");

        let ids: Vec<_> = store.list().expect("list").into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["Waves".to_string()]);
    }

    #[test]
    fn save_requires_existing_sketch() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);
        let err = store.save("Ghost", "void draw() {}").expect_err("missing");
        assert!(matches!(err, SketchbookError::NotFound(_)));
        assert!(!layout.sketch_dir("Ghost").exists());
    }

    #[test]
    fn rename_moves_source_and_star() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);
        store.create(Some("Waves")).expect("create");
        store.save("Waves", "// tides").expect("save");
        StarIndex::new(&layout).toggle("Waves").expect("star");

        let new_id = store.rename("Waves", "Ocean Waves").expect("rename");
        assert_eq!(new_id, "Ocean_Waves");
        assert_eq!(store.load("Ocean_Waves").expect("load"), "// tides");
        assert!(!layout.sketch_dir("Waves").exists());
        assert_eq!(
            StarIndex::new(&layout).list().expect("stars"),
            vec!["Ocean_Waves".to_string()]
        );
    }

    #[test]
    fn rename_to_same_id_is_a_no_op_and_blank_is_invalid() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);
        store.create(Some("Waves")).expect("create");
        assert_eq!(store.rename("Waves", "Waves").expect("same"), "Waves");
        let err = store.rename("Waves", "").expect_err("blank");
        assert!(matches!(err, SketchbookError::InvalidName(_)));
    }

    #[test]
    fn rename_onto_existing_sketch_fails() {
        let (_dir, layout) = layout();
        let store = SketchStore::new(&layout);
        store.create(Some("A")).expect("a");
        store.create(Some("B")).expect("b");
        let err = store.rename("A", "B").expect_err("collision");
        assert!(matches!(err, SketchbookError::AlreadyExists(_)));
        assert!(layout.main_source("A").exists());
    }
}
