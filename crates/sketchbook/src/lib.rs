//! # Entropic Sketchbook
//!
//! File-system bookkeeping for Processing sketches.
//!
//! ## Lifecycle
//!
//! ```text
//! Active sketch ──stage──> Variant (v1, v2, ...)
//!     │                        │
//!     └──soft_delete──┐        └──soft_delete──┐
//!                     v                        v
//!                   Bin  ──restore──> Active
//!                     │
//!                     └──permanent_delete / empty / 30-day sweep──> Purged
//! ```
//!
//! Every JSON index mutation runs under an `fs2` lock on a sibling `*.lock`
//! file and is written atomically.
//!
//! ## Example
//!
//! ```no_run
//! use entropic_sketchbook::{Layout, Sketchbook};
//!
//! fn main() -> entropic_sketchbook::Result<()> {
//!     let book = Sketchbook::open(Layout::for_documents_dir("/home/ada/Documents".as_ref()))?;
//!     let sketch = book.sketches().create(Some("Waves"))?;
//!     let stash = book.variants().stage(&sketch.id, None)?;
//!     println!("{} staged as {}", sketch.id, stash.id);
//!     Ok(())
//! }
//! ```

mod book;
mod clock;
mod error;
mod json_io;
mod layout;
mod model;
mod naming;
mod recycle_bin;
mod sketches;
mod stars;
mod variants;

pub use book::Sketchbook;
pub use clock::{unix_now_ms, MS_PER_DAY};
pub use error::{Result, SketchbookError};
pub use layout::{
    source_file_name, Layout, BIN_DIR_NAME, CONFIG_FILE_NAME, ENTROPIC_DIR_NAME,
    SKETCHES_DIR_NAME, SOURCE_EXTENSION,
};
pub use model::{BinItem, BinItemKey, BinItemKind, Sketch, Variant};
pub use naming::{sanitize_name, sketch_id_for_create, UNTITLED_SKETCH_ID};
pub use recycle_bin::{Bin, BinOutcome, SweepReport, BIN_RETENTION_DAYS, BIN_RETENTION_MS};
pub use sketches::{SketchStore, DEFAULT_TEMPLATE};
pub use stars::StarIndex;
pub use variants::VariantStore;
