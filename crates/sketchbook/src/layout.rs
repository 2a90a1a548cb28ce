use std::path::{Path, PathBuf};

pub const ENTROPIC_DIR_NAME: &str = "Entropic";
pub const SKETCHES_DIR_NAME: &str = "sketches";
pub const BIN_DIR_NAME: &str = ".bin";

pub const SOURCE_EXTENSION: &str = "pde";
pub const VARIANTS_DIR_NAME: &str = ".variants";
pub const VARIANTS_INDEX_FILE_NAME: &str = ".variants.json";
pub const STARRED_INDEX_FILE_NAME: &str = ".starred.json";
pub const BIN_INDEX_FILE_NAME: &str = "metadata.json";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Resolved on-disk layout of one sketchbook.
///
/// ```text
/// <documents>/Entropic/
///     sketches/<id>/<id>.pde
///     sketches/<id>/.variants/<vid>.pde
///     sketches/<id>/.variants.json
///     sketches/.starred.json
///     .bin/<id>/...                   (binned sketch)
///     .bin/<sketchId>_<variantId>.pde (binned variant)
///     .bin/metadata.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at an explicit `Entropic` directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at `<documents>/Entropic`.
    pub fn for_documents_dir(documents: &Path) -> Self {
        Self::new(documents.join(ENTROPIC_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn sketches_dir(&self) -> PathBuf {
        self.root.join(SKETCHES_DIR_NAME)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR_NAME)
    }

    pub fn sketch_dir(&self, id: &str) -> PathBuf {
        self.sketches_dir().join(id)
    }

    pub fn main_source(&self, id: &str) -> PathBuf {
        self.sketch_dir(id).join(source_file_name(id))
    }

    pub fn variants_dir(&self, sketch_id: &str) -> PathBuf {
        self.sketch_dir(sketch_id).join(VARIANTS_DIR_NAME)
    }

    pub fn variant_source(&self, sketch_id: &str, variant_id: &str) -> PathBuf {
        self.variants_dir(sketch_id)
            .join(source_file_name(variant_id))
    }

    pub fn variants_index(&self, sketch_id: &str) -> PathBuf {
        self.sketch_dir(sketch_id).join(VARIANTS_INDEX_FILE_NAME)
    }

    pub fn starred_index(&self) -> PathBuf {
        self.sketches_dir().join(STARRED_INDEX_FILE_NAME)
    }

    pub fn bin_index(&self) -> PathBuf {
        self.bin_dir().join(BIN_INDEX_FILE_NAME)
    }

    pub fn binned_sketch(&self, id: &str) -> PathBuf {
        self.bin_dir().join(id)
    }

    pub fn binned_variant(&self, sketch_id: &str, variant_id: &str) -> PathBuf {
        self.bin_dir()
            .join(source_file_name(&format!("{sketch_id}_{variant_id}")))
    }

    pub(crate) fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.sketches_dir())?;
        std::fs::create_dir_all(self.bin_dir())?;
        Ok(())
    }
}

pub fn source_file_name(stem: &str) -> String {
    format!("{stem}.{SOURCE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_follow_documents_layout() {
        let layout = Layout::for_documents_dir(Path::new("/home/ada/Documents"));
        assert_eq!(
            layout.main_source("Waves"),
            PathBuf::from("/home/ada/Documents/Entropic/sketches/Waves/Waves.pde")
        );
        assert_eq!(
            layout.variant_source("Waves", "v2"),
            PathBuf::from("/home/ada/Documents/Entropic/sketches/Waves/.variants/v2.pde")
        );
        assert_eq!(
            layout.variants_index("Waves"),
            PathBuf::from("/home/ada/Documents/Entropic/sketches/Waves/.variants.json")
        );
        assert_eq!(
            layout.binned_variant("Waves", "v2"),
            PathBuf::from("/home/ada/Documents/Entropic/.bin/Waves_v2.pde")
        );
        assert_eq!(
            layout.bin_index(),
            PathBuf::from("/home/ada/Documents/Entropic/.bin/metadata.json")
        );
        assert_eq!(
            layout.starred_index(),
            PathBuf::from("/home/ada/Documents/Entropic/sketches/.starred.json")
        );
    }
}
