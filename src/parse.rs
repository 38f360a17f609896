//! Parsing and emission of compilation units.
//!
//! The engine only sees trees; this module turns unit text into an oxc
//! program and the rewritten program back into text.

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};

use crate::error::{ExposeError, Line};
use crate::expose::{expose_program, ExportRecord, UnitContext};
use crate::options::ExposeOptions;
use crate::registry::ExportRegistry;

/// One source file as handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationUnit {
    pub path: String,
    pub source: String,
}

impl CompilationUnit {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        CompilationUnit {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Output of a successfully rewritten unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedUnit {
    pub path: String,
    pub code: String,
    pub wrapped: bool,
    pub exports: Vec<ExportRecord>,
}

/// Source type for `path`. Units are always parsed with the module goal.
pub fn source_type_for(path: &str) -> SourceType {
    SourceType::from_path(path)
        .unwrap_or_else(|_| SourceType::mjs())
        .with_module(true)
}

pub fn parse_program<'a>(
    allocator: &'a Allocator,
    path: &str,
    source: &'a str,
) -> Result<Program<'a>, ExposeError> {
    let ret = Parser::new(allocator, source, source_type_for(path)).parse();

    if let Some(error) = ret.errors.first() {
        // The first label points at the offending token.
        let line = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .and_then(|label| u32::try_from(label.offset()).ok())
            .map_or(Line::UNKNOWN, |offset| Line::at(source, offset));
        return Err(ExposeError::Parse {
            message: error.to_string(),
            file: path.to_string(),
            line,
        });
    }
    if ret.panicked {
        return Err(ExposeError::Parse {
            message: "parser aborted".to_string(),
            file: path.to_string(),
            line: Line::UNKNOWN,
        });
    }

    Ok(ret.program)
}

pub fn emit_program(program: &Program<'_>, minify: bool) -> String {
    let codegen = if minify {
        Codegen::new().with_options(CodegenOptions::minify())
    } else {
        Codegen::new()
    };
    codegen.build(program).code
}

/// Parses, rewrites and re-emits one unit against `registry`.
pub fn expose_source(
    unit: &CompilationUnit,
    registry: &ExportRegistry,
    options: &ExposeOptions,
) -> Result<ExposedUnit, ExposeError> {
    let allocator = Allocator::default();
    let mut program = parse_program(&allocator, &unit.path, &unit.source)?;
    let context = UnitContext::new(unit.path.as_str());

    let summary = expose_program(
        &allocator,
        &mut program,
        &context,
        registry,
        &options.target,
    )?;

    Ok(ExposedUnit {
        path: unit.path.clone(),
        code: emit_program(&program, options.minify),
        wrapped: summary.wrapped,
        exports: summary.exports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExportTarget;

    #[test]
    fn test_source_type_from_extension() {
        assert!(source_type_for("lib/a.ts").is_typescript());
        assert!(source_type_for("lib/a.jsx").is_jsx());
        assert!(source_type_for("lib/a.js").is_module());
        assert!(source_type_for("no-extension").is_module());
    }

    #[test]
    fn test_parse_error_is_reported_with_file() {
        let allocator = Allocator::default();
        let err = parse_program(&allocator, "broken.js", "export const = ;").unwrap_err();
        match err {
            ExposeError::Parse { file, .. } => assert_eq!(file, "broken.js"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_carries_the_offending_line() {
        let allocator = Allocator::default();
        let source = "export const a = 1;\n\nlet b = ;\n";
        let err = parse_program(&allocator, "broken.js", source).unwrap_err();
        assert!(matches!(err, ExposeError::Parse { .. }));
        assert_eq!(err.line(), Line(Some(3)));

        let allocator = Allocator::default();
        let source = "var a = 1;\nexport { a };\nexport { a as a };\n";
        let err = parse_program(&allocator, "dup.js", source).unwrap_err();
        assert!(matches!(err, ExposeError::Parse { .. }));
        assert!(err.line().number().is_some());
    }

    #[test]
    fn test_receiver_text_is_never_spliced_into_code() {
        let unit = CompilationUnit::new("a.js", "export var a = 1;");
        for target in ["window); alert(1", "", "globalThis..lib", "window[0]"] {
            let registry = ExportRegistry::new();
            let options = ExposeOptions {
                target: ExportTarget::Global(target.to_string()),
                ..ExposeOptions::default()
            };
            let err = expose_source(&unit, &registry, &options).unwrap_err();
            assert!(matches!(err, ExposeError::InvalidTarget { .. }), "{:?}", target);
            assert!(registry.is_empty(), "{:?} claimed names", target);
        }
    }

    #[test]
    fn test_dotted_global_target_is_one_member_chain() {
        let registry = ExportRegistry::new();
        let unit = CompilationUnit::new("a.js", "export var a = 1;");
        let options = ExposeOptions {
            target: ExportTarget::Global("globalThis.lib".to_string()),
            ..ExposeOptions::default()
        };
        let exposed = expose_source(&unit, &registry, &options).unwrap();
        assert!(exposed.code.ends_with(".call(globalThis.lib);\n"));
        assert_eq!(exposed.code.matches(".call(").count(), 1);
    }

    #[test]
    fn test_expose_source_round_trip() {
        let registry = ExportRegistry::new();
        let unit = CompilationUnit::new(
            "math.js",
            "import { base } from './base';\nexport function add(a, b) { return a + b + base; }\n",
        );
        let exposed = expose_source(&unit, &registry, &ExposeOptions::default()).unwrap();

        assert!(exposed.wrapped);
        assert!(!exposed.code.contains("import"));
        assert!(!exposed.code.contains("export"));
        assert!(exposed.code.contains("function add(a, b)"));
        assert!(exposed.code.contains("this.add = add;"));
        assert!(exposed.code.contains(".call(this)"));
        assert_eq!(exposed.exports.len(), 1);
        assert_eq!(exposed.exports[0].name, "add");
        assert_eq!(exposed.exports[0].line, Line(Some(2)));
    }

    #[test]
    fn test_plain_script_is_emitted_unwrapped() {
        let registry = ExportRegistry::new();
        let unit = CompilationUnit::new("plain.js", "var x = 1;\nconsole.log(x);\n");
        let exposed = expose_source(&unit, &registry, &ExposeOptions::default()).unwrap();
        assert!(!exposed.wrapped);
        assert!(!exposed.code.contains(".call("));
        assert!(exposed.code.contains("var x = 1;"));
        assert!(registry.is_empty());
    }
}
