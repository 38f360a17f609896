use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ExposeError, Line};

// ═══════════════════════════════════════════════════════════════════════════════
// EXPORT NAMING REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Where an exposed name was first claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSite {
    pub file: String,
    pub line: Line,
}

impl ExportSite {
    pub fn new(file: impl Into<String>, line: Line) -> Self {
        ExportSite {
            file: file.into(),
            line,
        }
    }
}

/// Flat namespace shared by every unit of one run.
///
/// All rewritten units assign onto the same receiver, so two units exposing
/// the same name would overwrite each other at runtime. Claims are never
/// released; build a new registry for every independent run.
#[derive(Debug, Default)]
pub struct ExportRegistry {
    claims: Mutex<HashMap<String, ExportSite>>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        ExportRegistry::default()
    }

    /// Records `name` as exposed by `site`, failing if any unit already did.
    pub fn claim(&self, name: &str, site: ExportSite) -> Result<(), ExposeError> {
        let mut claims = self.lock();
        if let Some(first) = claims.get(name) {
            return Err(ExposeError::NameCollision {
                name: name.to_string(),
                file: site.file,
                line: site.line,
                first_file: first.file.clone(),
                first_line: first.line,
            });
        }
        claims.insert(name.to_string(), site);
        Ok(())
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn site(&self, name: &str) -> Option<ExportSite> {
        self.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted snapshot of every claimed name.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    // Insert is the last step of `claim`, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ExportSite>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
