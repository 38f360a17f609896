//! Discovery Module
//!
//! Recursively scans a directory for module sources and loads them as units.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::ExposeError;
use crate::parse::CompilationUnit;

/// Declaration files only carry types and are never exposed.
const DECLARATION_SUFFIXES: [&str; 3] = [".d.ts", ".d.mts", ".d.cts"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "node_modules" || name.starts_with('.')
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if DECLARATION_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.trim_start_matches('.') == ext))
        .unwrap_or(false)
}

/// All files under `dir` with one of `extensions`, sorted by path.
pub fn find_sources(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extensions))
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files
}

pub fn load_unit(path: &Path) -> Result<CompilationUnit, ExposeError> {
    let display = path.to_string_lossy().to_string();
    let source = fs::read_to_string(path).map_err(|e| ExposeError::Io {
        message: e.to_string(),
        file: display.clone(),
    })?;
    Ok(CompilationUnit::new(display, source))
}

pub fn load_units(paths: &[PathBuf]) -> Vec<Result<CompilationUnit, ExposeError>> {
    paths.iter().map(|p| load_unit(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["js".to_string(), ".mjs".to_string()]
    }

    #[test]
    fn test_finds_sources_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("lib/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();

        fs::write(root.join("lib/b.js"), "").unwrap();
        fs::write(root.join("lib/a.mjs"), "").unwrap();
        fs::write(root.join("lib/nested/c.js"), "").unwrap();
        fs::write(root.join("lib/readme.md"), "").unwrap();
        fs::write(root.join("lib/types.d.ts"), "").unwrap();
        fs::write(root.join("node_modules/dep/index.js"), "").unwrap();
        fs::write(root.join(".cache/x.js"), "").unwrap();

        let found: Vec<PathBuf> = find_sources(root, &extensions())
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("lib/a.mjs"),
                PathBuf::from("lib/b.js"),
                PathBuf::from("lib/nested/c.js"),
            ]
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.js");
        let results = load_units(&[missing]);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ExposeError::Io { .. })));
    }
}
