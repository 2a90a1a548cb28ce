use crate::{Result, RuntimeError};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const JDK_DIR_NAME: &str = "jdk";
pub const PROCESSING_DIR_NAME: &str = "processing";

const JAVA_SEARCH_DEPTH: usize = 6;
const JAVAC_SEARCH_DEPTH: usize = 1;
const JAR_SEARCH_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainMode {
    /// JDK and Processing jars shipped under the resources directory.
    Bundled,
    /// A Processing installation found on the machine.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub mode: ToolchainMode,
    pub java: PathBuf,
    pub javac: Option<PathBuf>,
    pub jars: Vec<PathBuf>,
    /// Resources dir for bundled toolchains, install root for system ones.
    pub base: PathBuf,
}

impl Toolchain {
    pub fn classpath(&self) -> Result<OsString> {
        join_classpath(self.jars.iter().map(PathBuf::as_path))
    }

    /// Jars followed by `extra`, the directory holding compiled sketch classes.
    pub fn classpath_with(&self, extra: &Path) -> Result<OsString> {
        join_classpath(
            self.jars
                .iter()
                .map(PathBuf::as_path)
                .chain(std::iter::once(extra)),
        )
    }
}

fn join_classpath<'a>(paths: impl Iterator<Item = &'a Path>) -> Result<OsString> {
    std::env::join_paths(paths)
        .map_err(|err| RuntimeError::Other(format!("classpath entry is not joinable: {err}")))
}

/// Answer of `check_runtime`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainStatus {
    pub installed: bool,
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ToolchainMode>,
    pub has_compiler: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Finds a JDK plus Processing jars: bundled resources first, then the
/// system install roots.
#[derive(Debug, Clone)]
pub struct ToolchainLocator {
    resources_dir: PathBuf,
    system_roots: Vec<PathBuf>,
}

impl ToolchainLocator {
    pub fn new(resources_dir: impl Into<PathBuf>, system_roots: Vec<PathBuf>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
            system_roots,
        }
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn system_roots(&self) -> &[PathBuf] {
        &self.system_roots
    }

    /// `<resources>/processing`, also where contributed libraries live.
    pub fn processing_dir(&self) -> PathBuf {
        self.resources_dir.join(PROCESSING_DIR_NAME)
    }

    pub fn locate(&self) -> Option<Toolchain> {
        self.bundled().or_else(|| self.system())
    }

    pub fn bundled(&self) -> Option<Toolchain> {
        let bin = self
            .resources_dir
            .join(JDK_DIR_NAME)
            .join(platform_dir())
            .join("bin");
        let java = bin.join(exe_name("java"));
        if !java.is_file() {
            return None;
        }
        let jars = top_level_jars(&self.processing_dir());
        if jars.is_empty() {
            log::debug!(
                "Bundled java found but {} has no jars",
                self.processing_dir().display()
            );
            return None;
        }
        let javac = Some(bin.join(exe_name("javac"))).filter(|p| p.is_file());
        Some(Toolchain {
            mode: ToolchainMode::Bundled,
            java,
            javac,
            jars,
            base: self.resources_dir.clone(),
        })
    }

    pub fn system(&self) -> Option<Toolchain> {
        for root in self.system_roots.iter().filter(|r| r.is_dir()) {
            log::debug!("Searching Processing in {}", root.display());
            let Some(java) = find_file(root, &exe_name("java"), JAVA_SEARCH_DEPTH) else {
                continue;
            };
            let javac = java
                .parent()
                .and_then(|dir| find_file(dir, &exe_name("javac"), JAVAC_SEARCH_DEPTH));
            let jars = nested_jars(&root.join("app"), JAR_SEARCH_DEPTH);
            if jars.is_empty() {
                log::debug!("Found {} but no jars under app/", java.display());
                continue;
            }
            return Some(Toolchain {
                mode: ToolchainMode::System,
                java,
                javac,
                jars,
                base: root.clone(),
            });
        }
        None
    }

    pub fn status(&self) -> ToolchainStatus {
        match self.locate() {
            Some(toolchain) => ToolchainStatus {
                installed: true,
                path: Some(toolchain.java),
                mode: Some(toolchain.mode),
                has_compiler: toolchain.javac.is_some(),
                error: None,
            },
            None => ToolchainStatus {
                installed: false,
                path: None,
                mode: None,
                has_compiler: false,
                error: Some(format!(
                    "Please install Processing or add libraries to {}",
                    self.processing_dir().display()
                )),
            },
        }
    }
}

/// Install roots searched for a system Processing, plus `extra` when given.
pub fn default_system_roots(extra: Option<PathBuf>) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = extra.into_iter().collect();
    if cfg!(windows) {
        roots.push(PathBuf::from(r"C:\Program Files\Processing"));
        roots.push(PathBuf::from(r"C:\Program Files (x86)\Processing"));
    } else if cfg!(target_os = "macos") {
        roots.push(PathBuf::from("/Applications/Processing.app/Contents"));
    } else {
        roots.push(PathBuf::from("/opt/processing"));
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("processing"));
        }
    }
    roots
}

fn platform_dir() -> &'static str {
    if cfg!(windows) {
        "win"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else {
        "linux"
    }
}

fn exe_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{stem}.exe")
    } else {
        stem.to_string()
    }
}

/// Shallowest file called `name` under `dir`, searching `max_depth` levels of
/// subdirectories.
fn find_file(dir: &Path, name: &str, max_depth: usize) -> Option<PathBuf> {
    WalkDir::new(dir)
        .max_depth(max_depth + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .min_by_key(walkdir::DirEntry::depth)
        .map(walkdir::DirEntry::into_path)
}

fn nested_jars(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .max_depth(max_depth + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_jar(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn top_level_jars(dir: &Path) -> Vec<PathBuf> {
    nested_jars(dir, 0)
}

fn is_jar(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("jar")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "").expect("write");
    }

    #[test]
    fn bundled_requires_java_and_jars() {
        let dir = TempDir::new().expect("tempdir");
        let resources = dir.path().join("resources");
        let locator = ToolchainLocator::new(&resources, Vec::new());
        assert!(locator.bundled().is_none());

        let bin = resources.join("jdk").join(platform_dir()).join("bin");
        touch(&bin.join(exe_name("java")));
        assert!(locator.bundled().is_none(), "no jars yet");

        touch(&resources.join("processing").join("core.jar"));
        touch(&resources.join("processing").join("nested").join("ignored.jar"));
        let toolchain = locator.bundled().expect("bundled");
        assert_eq!(toolchain.mode, ToolchainMode::Bundled);
        assert_eq!(toolchain.javac, None);
        assert_eq!(toolchain.jars, vec![resources.join("processing").join("core.jar")]);

        touch(&bin.join(exe_name("javac")));
        assert!(locator.status().has_compiler);
    }

    #[test]
    fn system_search_finds_nested_java_and_app_jars() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("processing-4.3");
        let java_bin = root.join("java").join("bin");
        touch(&java_bin.join(exe_name("java")));
        touch(&java_bin.join(exe_name("javac")));
        touch(&root.join("app").join("lib").join("core").join("core.jar"));
        touch(&root.join("app").join("pde.jar"));

        let locator = ToolchainLocator::new(dir.path().join("missing"), vec![root.clone()]);
        let toolchain = locator.locate().expect("system toolchain");
        assert_eq!(toolchain.mode, ToolchainMode::System);
        assert_eq!(toolchain.java, java_bin.join(exe_name("java")));
        assert_eq!(toolchain.javac, Some(java_bin.join(exe_name("javac"))));
        assert_eq!(toolchain.jars.len(), 2);
        assert_eq!(toolchain.base, root);
    }

    #[test]
    fn missing_toolchain_reports_hint() {
        let dir = TempDir::new().expect("tempdir");
        let locator = ToolchainLocator::new(dir.path(), vec![dir.path().join("nope")]);
        let status = locator.status();
        assert!(!status.installed);
        assert!(status.error.expect("error").contains("processing"));

        let value = serde_json::to_value(locator.status()).expect("json");
        assert_eq!(value["hasCompiler"], false);
    }

    #[test]
    fn classpath_appends_build_dir_last() {
        let toolchain = Toolchain {
            mode: ToolchainMode::Bundled,
            java: PathBuf::from("java"),
            javac: None,
            jars: vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")],
            base: PathBuf::new(),
        };
        let cp = toolchain.classpath_with(Path::new("build")).expect("cp");
        let parts: Vec<PathBuf> = std::env::split_paths(&cp).collect();
        assert_eq!(
            parts,
            vec![
                PathBuf::from("a.jar"),
                PathBuf::from("b.jar"),
                PathBuf::from("build")
            ]
        );
    }
}
