use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_UNSUPPORTED: &str = "EXP-ERR-UNSUPPORTED";
pub const ERR_UNNAMEABLE: &str = "EXP-ERR-UNNAMEABLE";
pub const ERR_COLLISION: &str = "EXP-ERR-COLLISION";
pub const ERR_PARSE: &str = "EXP-ERR-PARSE";
pub const ERR_IO: &str = "EXP-ERR-IO";
pub const ERR_TARGET: &str = "EXP-ERR-TARGET";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_UNSUPPORTED => "Only exports that can be expressed as local assignments are exposed.",
        ERR_UNNAMEABLE => "Every exposed value is reachable through a named property.",
        ERR_COLLISION => "Each exposed name is assigned by exactly one unit per run.",
        ERR_PARSE => "Only syntactically valid units are rewritten.",
        ERR_IO => "Every discovered unit is read before it is rewritten.",
        ERR_TARGET => "The isolation wrap is invoked against a valid receiver expression.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LINE
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based line inside a unit. Renders as `?` when the position is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Line(pub Option<u32>);

impl Line {
    pub const UNKNOWN: Line = Line(None);

    /// Line containing the byte `offset` of `source_text`.
    pub fn at(source_text: &str, offset: u32) -> Self {
        match source_text.get(..offset as usize) {
            Some(prefix) => Line(Some(prefix.matches('\n').count() as u32 + 1)),
            None => Line::UNKNOWN,
        }
    }

    pub fn number(self) -> Option<u32> {
        self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(line) => write!(f, "{}", line),
            None => f.write_str("?"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPOSE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnnameableReason {
    /// Function or class without an id.
    Anonymous,
    /// Bare literal value.
    Literal,
    /// Any other expression (calls, objects, arrows...).
    Expression,
    /// Exported string name that is not a valid identifier.
    InvalidName,
}

impl fmt::Display for UnnameableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnnameableReason::Anonymous => f.write_str(
                "Anonymous declarations cannot be named automatically. Give the declaration a name.",
            ),
            UnnameableReason::Literal => f.write_str(
                "We need help to determine how to expose this literal in global namespace.\n\
                 Please assign it to a variable and it will be accessible through this variable in global namespace.",
            ),
            UnnameableReason::Expression => f.write_str(
                "Only identifiers and named declarations can be exposed. Assign the expression to a variable first.",
            ),
            UnnameableReason::InvalidName => {
                f.write_str("The exported name is not a valid identifier.")
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExposeError {
    #[error("{construct} is not currently supported. PR is welcome. ({file}:{line})")]
    UnsupportedConstruct {
        construct: String,
        file: String,
        line: Line,
    },

    #[error("can't get name for {name_hint} in {file}:{line}\n{reason}")]
    UnnameableExport {
        name_hint: String,
        reason: UnnameableReason,
        file: String,
        line: Line,
    },

    #[error("{name} is already defined, please change name for {file}:{line} (first defined in {first_file}:{first_line})")]
    NameCollision {
        name: String,
        file: String,
        line: Line,
        first_file: String,
        first_line: Line,
    },

    #[error("failed to parse {file}:{line}: {message}")]
    Parse {
        message: String,
        file: String,
        line: Line,
    },

    #[error("failed to read {file}: {message}")]
    Io { message: String, file: String },

    #[error("invalid export target '{target}': {message}")]
    InvalidTarget { target: String, message: String },
}

impl ExposeError {
    pub fn code(&self) -> &'static str {
        match self {
            ExposeError::UnsupportedConstruct { .. } => ERR_UNSUPPORTED,
            ExposeError::UnnameableExport { .. } => ERR_UNNAMEABLE,
            ExposeError::NameCollision { .. } => ERR_COLLISION,
            ExposeError::Parse { .. } => ERR_PARSE,
            ExposeError::Io { .. } => ERR_IO,
            ExposeError::InvalidTarget { .. } => ERR_TARGET,
        }
    }

    pub fn guarantee(&self) -> &'static str {
        get_guarantee(self.code())
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            ExposeError::UnsupportedConstruct { file, .. }
            | ExposeError::UnnameableExport { file, .. }
            | ExposeError::NameCollision { file, .. }
            | ExposeError::Parse { file, .. }
            | ExposeError::Io { file, .. } => Some(file),
            ExposeError::InvalidTarget { .. } => None,
        }
    }

    pub fn line(&self) -> Line {
        match self {
            ExposeError::UnsupportedConstruct { line, .. }
            | ExposeError::UnnameableExport { line, .. }
            | ExposeError::NameCollision { line, .. }
            | ExposeError::Parse { line, .. } => *line,
            ExposeError::Io { .. } | ExposeError::InvalidTarget { .. } => Line::UNKNOWN,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializable form of an [`ExposeError`] handed across the host boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl From<&ExposeError> for Diagnostic {
    fn from(error: &ExposeError) -> Self {
        Diagnostic {
            code: error.code().to_string(),
            message: error.to_string(),
            guarantee: error.guarantee().to_string(),
            file: error.file().map(str::to_string),
            line: error.line().number(),
        }
    }
}
