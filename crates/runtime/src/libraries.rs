use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

static IMPORT_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([^;\n]+);").expect("import regex"));

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LibraryStatus {
    pub name: String,
    pub installed: bool,
}

/// Library names referenced by `import` lines, de-duplicated in source order.
///
/// `processing.<x>` maps to `<x>`; anything else maps to its first package segment.
pub fn detect_libraries(code: &str) -> Vec<String> {
    let mut libs: Vec<String> = Vec::new();
    for caps in IMPORT_TARGET.captures_iter(code) {
        let target = caps[1].trim();
        let mut segments = target.split('.').map(str::trim);
        let lib = match segments.next() {
            Some("processing") => segments.next(),
            first => first,
        };
        let Some(lib) = lib.filter(|l| !l.is_empty() && *l != "*") else {
            continue;
        };
        if !libs.iter().any(|seen| seen == lib) {
            libs.push(lib.to_string());
        }
    }
    libs
}

/// A library counts as installed when `lib_dir` holds `<name>.jar`, a
/// `<name>` directory, or any entry whose name contains `<name>`
/// (case-insensitive).
pub fn library_installed(lib_dir: &Path, name: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(lib_dir) else {
        return false;
    };
    let target = name.to_lowercase();
    let jar = format!("{target}.jar");
    entries.filter_map(std::result::Result::ok).any(|entry| {
        let entry_name = entry.file_name().to_string_lossy().to_lowercase();
        entry_name == jar
            || (entry_name == target && entry.path().is_dir())
            || entry_name.contains(&target)
    })
}

pub fn check_libraries(lib_dir: &Path, code: &str) -> Vec<LibraryStatus> {
    detect_libraries(code)
        .into_iter()
        .map(|name| LibraryStatus {
            installed: library_installed(lib_dir, &name),
            name,
        })
        .collect()
}

/// Creates the library directory when missing and returns it.
pub fn ensure_library_dir(lib_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(lib_dir)?;
    Ok(lib_dir.to_path_buf())
}
