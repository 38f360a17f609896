use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::error::ExposeError;
use crate::options::ExposeOptions;
use crate::parse::ExposedUnit;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub unit: ExposedUnit,
}

/// Content-addressed store of rewritten units.
///
/// Entries are keyed on the source together with every option that changes
/// the emitted code, so a run with another receiver or minify setting misses.
///
/// A hit skips parsing and rewriting only. The caller still has to claim
/// every recorded export in the run's registry.
pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, ExposeError> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| ExposeError::Io {
                message: e.to_string(),
                file: cache_dir.display().to_string(),
            })?;
        }
        Ok(Self { cache_dir })
    }

    pub fn compute_hash(source: &str, options: &ExposeOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(options.target.receiver().as_bytes());
        hasher.update([0u8, u8::from(options.minify)]);
        format!("{:x}", hasher.finalize())
    }

    fn get_cache_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(
        &self,
        file_path: &str,
        source: &str,
        options: &ExposeOptions,
    ) -> Option<ExposedUnit> {
        let cache_path = self.get_cache_path(file_path);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(file = file_path, error = %e, "cache entry unreadable, removing it");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source, options) && entry.unit.path == file_path {
            Some(entry.unit)
        } else {
            None
        }
    }

    pub fn set(&self, source: &str, options: &ExposeOptions, unit: &ExposedUnit) {
        let cache_path = self.get_cache_path(&unit.path);
        let entry = CacheEntry {
            hash: Self::compute_hash(source, options),
            unit: unit.clone(),
        };

        match serde_json::to_string(&entry) {
            Ok(data) => {
                if let Err(e) = fs::write(&cache_path, data) {
                    warn!(file = %unit.path, error = %e, "failed to write cache entry");
                }
            }
            Err(e) => warn!(file = %unit.path, error = %e, "failed to encode cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Line;
    use crate::expose::ExportRecord;
    use crate::options::ExportTarget;
    use tempfile::tempdir;

    fn sample_unit(path: &str) -> ExposedUnit {
        ExposedUnit {
            path: path.to_string(),
            code: "(function() {\n\tthis.a = a;\n}).call(this);\n".to_string(),
            wrapped: true,
            exports: vec![ExportRecord {
                name: "a".to_string(),
                line: Line(Some(1)),
            }],
        }
    }

    #[test]
    fn test_hit_requires_same_source() {
        let dir = tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path().join("cache")).unwrap();
        let unit = sample_unit("src/a.js");
        let options = ExposeOptions::default();

        cache.set("export var a = 1;", &options, &unit);
        assert_eq!(cache.get("src/a.js", "export var a = 1;", &options), Some(unit));
        assert_eq!(cache.get("src/a.js", "export var a = 2;", &options), None);
        assert_eq!(cache.get("src/b.js", "export var a = 1;", &options), None);
    }

    #[test]
    fn test_hit_requires_same_output_options() {
        let dir = tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let window = ExposeOptions {
            target: ExportTarget::Global("window".to_string()),
            ..ExposeOptions::default()
        };
        let minified = ExposeOptions {
            minify: true,
            ..window.clone()
        };

        cache.set("export var a = 1;", &window, &sample_unit("src/a.js"));
        assert!(cache.get("src/a.js", "export var a = 1;", &window).is_some());
        let this = ExposeOptions::default();
        assert_eq!(cache.get("src/a.js", "export var a = 1;", &this), None);
        assert_eq!(cache.get("src/a.js", "export var a = 1;", &minified), None);
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let dir = tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path()).unwrap();
        let path = cache.get_cache_path("src/a.js");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(cache.get("src/a.js", "anything", &ExposeOptions::default()), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let options = ExposeOptions::default();
        let hash = IncrementalCache::compute_hash("abc", &options);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, IncrementalCache::compute_hash("abc", &options));
        assert_ne!(hash, IncrementalCache::compute_hash("abd", &options));
    }
}
