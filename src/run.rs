//! Runs: many units exposed against one registry.
//!
//! A run is the unit of namespace exclusivity. Every `ExposeRun` owns a fresh
//! [`ExportRegistry`], so names never leak between independent runs.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cache::IncrementalCache;
use crate::discovery::{find_sources, load_units};
use crate::error::{Diagnostic, ExposeError};
use crate::options::ExposeOptions;
use crate::parse::{expose_source, CompilationUnit, ExposedUnit};
use crate::registry::{ExportRegistry, ExportSite};

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub path: String,
    pub result: Result<ExposedUnit, ExposeError>,
}

impl UnitOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct ExposeRun {
    options: ExposeOptions,
    registry: ExportRegistry,
    cache: Option<IncrementalCache>,
}

impl ExposeRun {
    pub fn new(options: ExposeOptions) -> Result<Self, ExposeError> {
        options.target.validate()?;
        let cache = match &options.cache_dir {
            Some(dir) => Some(IncrementalCache::new(dir)?),
            None => None,
        };
        Ok(Self {
            options,
            registry: ExportRegistry::new(),
            cache,
        })
    }

    pub fn options(&self) -> &ExposeOptions {
        &self.options
    }

    pub fn registry(&self) -> &ExportRegistry {
        &self.registry
    }

    pub fn expose_unit(&self, unit: &CompilationUnit) -> Result<ExposedUnit, ExposeError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&unit.path, &unit.source, &self.options) {
                debug!(file = %unit.path, "cache hit");
                for export in &cached.exports {
                    self.registry
                        .claim(&export.name, ExportSite::new(unit.path.as_str(), export.line))?;
                }
                return Ok(cached);
            }
        }

        let exposed = expose_source(unit, &self.registry, &self.options)?;
        if let Some(cache) = &self.cache {
            cache.set(&unit.source, &self.options, &exposed);
        }
        Ok(exposed)
    }

    /// Exposes every unit; outcomes are returned in input order.
    ///
    /// In parallel mode the unit that loses a name collision depends on
    /// scheduling, but exactly one of them fails.
    pub fn expose_all(&self, units: &[CompilationUnit]) -> Vec<UnitOutcome> {
        let expose = |unit: &CompilationUnit| {
            let result = self.expose_unit(unit);
            if let Err(e) = &result {
                warn!(file = %unit.path, code = e.code(), "{}", e);
            }
            UnitOutcome {
                path: unit.path.clone(),
                result,
            }
        };

        let outcomes: Vec<UnitOutcome> = if self.options.parallel {
            units.par_iter().map(expose).collect()
        } else {
            units.iter().map(expose).collect()
        };

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            units = outcomes.len(),
            failed,
            exports = self.registry.len(),
            "run finished"
        );
        outcomes
    }

    /// Exposes every source under `dir`. Outcomes follow discovery order,
    /// unreadable files included.
    pub fn expose_directory(&self, dir: &Path) -> Vec<UnitOutcome> {
        let paths = find_sources(dir, &self.options.extensions);
        debug!(dir = %dir.display(), files = paths.len(), "sources discovered");

        let mut units = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();
        for (index, (path, loaded)) in paths.iter().zip(load_units(&paths)).enumerate() {
            match loaded {
                Ok(unit) => units.push(unit),
                Err(e) => {
                    warn!(file = %path.display(), "{}", e);
                    unreadable.push((
                        index,
                        UnitOutcome {
                            path: path.to_string_lossy().to_string(),
                            result: Err(e),
                        },
                    ));
                }
            }
        }

        // Ascending indices: every earlier outcome is already in place.
        let mut outcomes = self.expose_all(&units);
        for (index, outcome) in unreadable {
            outcomes.insert(index, outcome);
        }
        outcomes
    }

    pub fn report(&self, outcomes: &[UnitOutcome]) -> RunReport {
        RunReport {
            units: outcomes.iter().map(UnitReport::from).collect(),
            export_count: self.registry.len() as u32,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub path: String,
    pub code: Option<String>,
    pub exports: Vec<String>,
    pub diagnostic: Option<Diagnostic>,
}

impl From<&UnitOutcome> for UnitReport {
    fn from(outcome: &UnitOutcome) -> Self {
        match &outcome.result {
            Ok(unit) => UnitReport {
                path: outcome.path.clone(),
                code: Some(unit.code.clone()),
                exports: unit.exports.iter().map(|e| e.name.clone()).collect(),
                diagnostic: None,
            },
            Err(e) => UnitReport {
                path: outcome.path.clone(),
                code: None,
                exports: Vec::new(),
                diagnostic: Some(Diagnostic::from(e)),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    pub export_count: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn run_from_json(options_json: &str) -> napi::Result<ExposeRun> {
    let options = ExposeOptions::from_json(options_json)
        .map_err(|e| napi::Error::from_reason(format!("Options parse error: {}", e)))?;
    ExposeRun::new(options).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
fn report_to_json(report: &RunReport) -> napi::Result<String> {
    serde_json::to_string(report)
        .map_err(|e| napi::Error::from_reason(format!("Report serialization error: {}", e)))
}

/// Exposes `[{ path, source }]` as one run with a fresh registry.
#[cfg(feature = "napi")]
#[napi]
pub fn expose_sources_native(units_json: String, options_json: String) -> napi::Result<String> {
    let units: Vec<CompilationUnit> = serde_json::from_str(&units_json)
        .map_err(|e| napi::Error::from_reason(format!("Units parse error: {}", e)))?;
    let run = run_from_json(&options_json)?;
    let outcomes = run.expose_all(&units);
    report_to_json(&run.report(&outcomes))
}

#[cfg(feature = "napi")]
#[napi]
pub fn expose_directory_native(dir: String, options_json: String) -> napi::Result<String> {
    let run = run_from_json(&options_json)?;
    let outcomes = run.expose_directory(Path::new(&dir));
    report_to_json(&run.report(&outcomes))
}
