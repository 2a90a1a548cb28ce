use crate::layout::Layout;
use crate::recycle_bin::Bin;
use crate::sketches::SketchStore;
use crate::stars::StarIndex;
use crate::variants::VariantStore;
use crate::Result;

/// Entry point owning the resolved layout. The stores it hands out are
/// borrowed views and cost nothing to create.
#[derive(Debug, Clone)]
pub struct Sketchbook {
    layout: Layout,
}

impl Sketchbook {
    /// Creates `sketches/` and `.bin/` when missing.
    pub fn open(layout: Layout) -> Result<Self> {
        layout.ensure_dirs()?;
        log::debug!("Opened sketchbook at {}", layout.root().display());
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn sketches(&self) -> SketchStore<'_> {
        SketchStore::new(&self.layout)
    }

    pub fn variants(&self) -> VariantStore<'_> {
        VariantStore::new(&self.layout)
    }

    pub fn bin(&self) -> Bin<'_> {
        Bin::new(&self.layout)
    }

    pub fn stars(&self) -> StarIndex<'_> {
        StarIndex::new(&self.layout)
    }
}
