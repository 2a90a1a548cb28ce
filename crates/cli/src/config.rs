use anyhow::{Context, Result};
use entropic_runtime::{default_system_roots, RunConfig, ToolchainLocator, BUILD_DIR_NAME};
use entropic_sketchbook::Layout;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DOCUMENTS_DIR: &str = "ENTROPIC_DOCUMENTS_DIR";
pub const ENV_RESOURCES_DIR: &str = "ENTROPIC_RESOURCES_DIR";
pub const ENV_PROCESSING_HOME: &str = "ENTROPIC_PROCESSING_HOME";
pub const ENV_BUILD_DIR: &str = "ENTROPIC_BUILD_DIR";
pub const ENV_STOP_GRACE_MS: &str = "ENTROPIC_STOP_GRACE_MS";

const DEFAULT_STOP_GRACE_MS: u64 = 2000;
const RESOURCES_DIR_NAME: &str = "resources";

/// Values from global CLI flags; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub documents_dir: Option<PathBuf>,
    pub resources_dir: Option<PathBuf>,
}

/// Optional `<documents>/Entropic/config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    resources_dir: Option<PathBuf>,
    processing_home: Option<PathBuf>,
    build_dir: Option<PathBuf>,
    stop_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub documents_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub processing_home: Option<PathBuf>,
    pub build_dir: PathBuf,
    pub stop_grace: Duration,
}

impl AppConfig {
    /// Defaults, then `config.json`, then environment, then flags.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var_os(key))
    }

    fn resolve_with(
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self> {
        let env_path = |key: &str| env(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let documents_dir = match overrides
            .documents_dir
            .clone()
            .or_else(|| env_path(ENV_DOCUMENTS_DIR))
        {
            Some(dir) => dir,
            None => default_documents_dir()
                .context("Cannot determine the documents directory; pass --documents-dir")?,
        };
        let file = load_file_config(&Layout::for_documents_dir(&documents_dir).config_file());

        let resources_dir = overrides
            .resources_dir
            .clone()
            .or_else(|| env_path(ENV_RESOURCES_DIR))
            .or(file.resources_dir)
            .unwrap_or_else(default_resources_dir);
        let processing_home = env_path(ENV_PROCESSING_HOME).or(file.processing_home);
        let build_dir = env_path(ENV_BUILD_DIR)
            .or(file.build_dir)
            .unwrap_or_else(|| std::env::temp_dir().join(BUILD_DIR_NAME));

        let env_grace = env(ENV_STOP_GRACE_MS).and_then(|raw| {
            let raw = raw.to_string_lossy().into_owned();
            match raw.trim().parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    log::warn!("Ignoring {ENV_STOP_GRACE_MS}={raw}: not a number of milliseconds");
                    None
                }
            }
        });
        let stop_grace_ms = env_grace
            .or(file.stop_grace_ms)
            .unwrap_or(DEFAULT_STOP_GRACE_MS);

        Ok(Self {
            documents_dir,
            resources_dir,
            processing_home,
            build_dir,
            stop_grace: Duration::from_millis(stop_grace_ms),
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::for_documents_dir(&self.documents_dir)
    }

    pub fn locator(&self) -> ToolchainLocator {
        ToolchainLocator::new(
            &self.resources_dir,
            default_system_roots(self.processing_home.clone()),
        )
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            build_dir: self.build_dir.clone(),
            stop_grace: self.stop_grace,
        }
    }
}

fn load_file_config(path: &Path) -> FileConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return FileConfig::default(),
        Err(err) => {
            log::warn!("Ignoring config {}: {err}", path.display());
            return FileConfig::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(config) => {
            log::debug!("Loaded config from {}", path.display());
            config
        }
        Err(err) => {
            log::warn!("Ignoring invalid config {}: {err}", path.display());
            FileConfig::default()
        }
    }
}

fn default_documents_dir() -> Option<PathBuf> {
    dirs::document_dir().or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
}

fn default_resources_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(RESOURCES_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(RESOURCES_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(documents: &Path, body: &str) {
        let root = documents.join("Entropic");
        std::fs::create_dir_all(&root).expect("mkdir");
        std::fs::write(root.join("config.json"), body).expect("write");
    }

    #[test]
    fn file_then_env_then_flags() {
        let dir = TempDir::new().expect("tempdir");
        write_config(
            dir.path(),
            r#"{"resources_dir":"/from/file","build_dir":"/build/file","stop_grace_ms":500}"#,
        );
        let docs = dir.path().to_string_lossy().into_owned();

        let from_file = AppConfig::resolve_with(
            &ConfigOverrides::default(),
            env_from(&[(ENV_DOCUMENTS_DIR, &docs)]),
        )
        .expect("resolve");
        assert_eq!(from_file.resources_dir, PathBuf::from("/from/file"));
        assert_eq!(from_file.build_dir, PathBuf::from("/build/file"));
        assert_eq!(from_file.stop_grace, Duration::from_millis(500));

        let from_env = AppConfig::resolve_with(
            &ConfigOverrides::default(),
            env_from(&[
                (ENV_DOCUMENTS_DIR, &docs),
                (ENV_RESOURCES_DIR, "/from/env"),
                (ENV_STOP_GRACE_MS, "750"),
            ]),
        )
        .expect("resolve");
        assert_eq!(from_env.resources_dir, PathBuf::from("/from/env"));
        assert_eq!(from_env.stop_grace, Duration::from_millis(750));

        let from_flag = AppConfig::resolve_with(
            &ConfigOverrides {
                documents_dir: None,
                resources_dir: Some(PathBuf::from("/from/flag")),
            },
            env_from(&[(ENV_DOCUMENTS_DIR, &docs), (ENV_RESOURCES_DIR, "/from/env")]),
        )
        .expect("resolve");
        assert_eq!(from_flag.resources_dir, PathBuf::from("/from/flag"));
    }

    #[test]
    fn invalid_config_file_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        write_config(dir.path(), "{ not json");
        let config = AppConfig::resolve_with(
            &ConfigOverrides {
                documents_dir: Some(dir.path().to_path_buf()),
                resources_dir: None,
            },
            env_from(&[(ENV_STOP_GRACE_MS, "soon")]),
        )
        .expect("resolve");
        assert_eq!(config.stop_grace, Duration::from_millis(DEFAULT_STOP_GRACE_MS));
        assert_eq!(config.layout().root(), dir.path().join("Entropic"));
    }

    #[test]
    fn processing_home_is_searched_first() {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig::resolve_with(
            &ConfigOverrides {
                documents_dir: Some(dir.path().to_path_buf()),
                resources_dir: None,
            },
            env_from(&[(ENV_PROCESSING_HOME, "/opt/p5")]),
        )
        .expect("resolve");
        assert_eq!(config.locator().system_roots()[0], PathBuf::from("/opt/p5"));
    }
}
