//! # Module Exposer
//!
//! Rewrites ES module units into plain scripts that expose their exports on
//! a shared receiver.
//!
//! ```text
//! import { base } from './base';          (function() {
//! export const answer = base + 1;   ==>     const answer = base + 1;
//!                                           this.answer = answer;
//!                                         }).call(this);
//! ```
//!
//! ## Rewrite Invariants
//!
//! 1. **Untouched Scripts**: a unit without import/export statements is emitted
//!    exactly as parsed.
//! 2. **Isolation Wrap**: a module unit becomes ONE statement, an inline
//!    zero-parameter function invoked with `.call(<receiver>)`.
//! 3. **Imports**: dropped without replacement. Load order satisfies them.
//! 4. **Default Export**: `export default function f() {}` becomes
//!    `this.f = function f() {}`. The declaration is not kept separately.
//! 5. **Named Export**: the declaration stays, followed by one
//!    `this.<name> = <name>` per binding, in source order.
//! 6. **Flat Namespace**: a name may be exposed once per run across ALL units.
//!    `export *`, re-exports from other modules and anonymous or literal
//!    default exports are compile errors.

mod cache;
mod discovery;
mod error;
mod expose;
mod options;
mod parse;
mod registry;
mod run;


pub use cache::IncrementalCache;
pub use discovery::{find_sources, load_unit, load_units};
pub use error::{Diagnostic, ExposeError, Line, UnnameableReason};
pub use expose::{
    expose_program, is_module_syntax, ExportRecord, ExportRewriter, RewriteSummary, UnitContext,
};
pub use options::{ExportTarget, ExposeOptions};
pub use parse::{
    emit_program, expose_source, parse_program, source_type_for, CompilationUnit, ExposedUnit,
};
pub use registry::{ExportRegistry, ExportSite};
pub use run::{ExposeRun, RunReport, UnitOutcome, UnitReport};

#[cfg(feature = "napi")]
pub use run::{expose_directory_native, expose_sources_native};
