use oxc_syntax::identifier::is_identifier_name;
use serde::{Deserialize, Serialize};

use crate::error::ExposeError;

// ═══════════════════════════════════════════════════════════════════════════════
// EXPORT TARGET
// ═══════════════════════════════════════════════════════════════════════════════

/// Receiver the isolation wrap is invoked against.
///
/// Exports are always written as `this.<name> = ...` inside the wrap; the
/// target only decides what `this` is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExportTarget {
    /// `.call(this)`: whatever the unit's top-level `this` is.
    #[default]
    This,
    /// `.call(<path>)`, e.g. `window` or `globalThis.lib`.
    Global(String),
}

impl ExportTarget {
    pub fn receiver(&self) -> &str {
        match self {
            ExportTarget::This => "this",
            ExportTarget::Global(path) => path,
        }
    }

    pub fn validate(&self) -> Result<(), ExposeError> {
        let ExportTarget::Global(path) = self else {
            return Ok(());
        };
        if path.split('.').all(is_identifier_name) {
            Ok(())
        } else {
            Err(ExposeError::InvalidTarget {
                target: path.clone(),
                message: "expected an identifier or a dotted identifier path".to_string(),
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExposeOptions {
    /// File extensions picked up by directory discovery.
    pub extensions: Vec<String>,
    pub target: ExportTarget,
    /// Process units on the rayon pool.
    pub parallel: bool,
    /// Directory for the incremental cache. Disabled when `None`.
    pub cache_dir: Option<String>,
    pub minify: bool,
}

impl Default for ExposeOptions {
    fn default() -> Self {
        ExposeOptions {
            extensions: vec!["js".to_string(), "mjs".to_string(), "jsx".to_string()],
            target: ExportTarget::This,
            parallel: true,
            cache_dir: None,
            minify: false,
        }
    }
}

impl ExposeOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(ExposeOptions::default());
        }
        serde_json::from_str(json)
    }
}
