//! # Entropic Runtime
//!
//! Compiles and runs Processing sketches through a JDK.
//!
//! ```text
//! .pde source ──wrap_sketch──> <build>/<Name>/<Name>.java
//!                                  │
//!                                  ├──> javac (optional)
//!                                  └──> java -cp <jars>:<build> <Name>
//!                                         └─> SessionEvent stream
//! ```
//!
//! At most one sketch runs at a time; [`SketchRunner::run`] stops the
//! previous process (SIGTERM, then kill after the grace period) first.

mod error;
mod libraries;
mod preprocess;
mod runner;
mod toolchain;

pub use error::{Result, RuntimeError};
pub use libraries::{
    check_libraries, detect_libraries, ensure_library_dir, library_installed, LibraryStatus,
};
pub use preprocess::{class_name_for, wrap_sketch};
pub use runner::{
    EventSink, RunConfig, RunOutcome, RunStarted, SketchRunner, BUILD_DIR_NAME,
    DEFAULT_STOP_GRACE,
};
pub use toolchain::{
    default_system_roots, Toolchain, ToolchainLocator, ToolchainMode, ToolchainStatus,
    JDK_DIR_NAME, PROCESSING_DIR_NAME,
};
