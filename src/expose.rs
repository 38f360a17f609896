//! Export Rewrite Engine
//!
//! Turns one module-style unit into a plain script:
//!
//! 1. Units without import/export statements are left untouched.
//! 2. Otherwise the whole body moves into `(function () { ... }).call(this);`
//!    so top-level `var`s and functions stay private to the unit.
//! 3. Imports are dropped. Load order is expected to satisfy them.
//! 4. `export default <decl>` becomes `this.<name> = <decl>;`.
//! 5. `export <decl>` keeps `<decl>` and appends `this.<name> = <name>;` for
//!    every binding it introduces, in source order.
//! 6. Every exposed name is claimed in the run's [`ExportRegistry`] first.

use oxc_allocator::{Allocator, Box as ArenaBox, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_span::{Span, SPAN};
use oxc_syntax::identifier::is_identifier_name;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ExposeError, Line, UnnameableReason};
use crate::options::ExportTarget;
use crate::registry::{ExportRegistry, ExportSite};

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT CONTEXT & SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-unit data the engine needs besides the tree. Only used for diagnostics.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub path: String,
}

impl UnitContext {
    pub fn new(path: impl Into<String>) -> Self {
        UnitContext { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub name: String,
    pub line: Line,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Whether the isolation wrap was applied.
    pub wrapped: bool,
    /// Exposed names in emission order.
    pub exports: Vec<ExportRecord>,
}

/// Returns true when `stmt` is import/export syntax.
pub fn is_module_syntax(stmt: &Statement<'_>) -> bool {
    match stmt {
        Statement::ImportDeclaration(_)
        | Statement::ExportAllDeclaration(_)
        | Statement::ExportDefaultDeclaration(_)
        | Statement::ExportNamedDeclaration(_)
        | Statement::TSExportAssignment(_)
        | Statement::TSNamespaceExportDeclaration(_) => true,
        Statement::TSImportEqualsDeclaration(decl) => is_require_import(decl),
        _ => false,
    }
}

fn is_require_import(decl: &TSImportEqualsDeclaration<'_>) -> bool {
    matches!(
        decl.module_reference,
        TSModuleReference::ExternalModuleReference(_)
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPORT REWRITER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ExportRewriter<'a, 'r> {
    pub ast: AstBuilder<'a>,
    registry: &'r ExportRegistry,
    unit: &'r UnitContext,
    target: &'r ExportTarget,
    source_text: &'a str,
    exports: Vec<ExportRecord>,
}

impl<'a, 'r> ExportRewriter<'a, 'r> {
    pub fn new(
        allocator: &'a Allocator,
        registry: &'r ExportRegistry,
        unit: &'r UnitContext,
        target: &'r ExportTarget,
    ) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
            registry,
            unit,
            target,
            source_text: "",
            exports: Vec::new(),
        }
    }

    /// Rewrites `program.body` in place.
    ///
    /// On error the program is left half-rewritten and must be discarded.
    /// Names claimed before the failure stay claimed.
    pub fn rewrite_program(
        mut self,
        program: &mut Program<'a>,
    ) -> Result<RewriteSummary, ExposeError> {
        if !program.body.iter().any(is_module_syntax) {
            trace!(file = %self.unit.path, "no module syntax, unit left untouched");
            return Ok(RewriteSummary::default());
        }

        let receiver = self.receiver()?;
        self.source_text = program.source_text;
        let original = std::mem::replace(&mut program.body, self.ast.vec());
        let mut body = self.ast.vec_with_capacity(original.len());

        for stmt in original {
            match stmt {
                Statement::ImportDeclaration(_) => {}
                Statement::TSImportEqualsDeclaration(decl) if is_require_import(&decl) => {}
                Statement::ExportAllDeclaration(decl) => {
                    let construct = match &decl.exported {
                        Some(name) => {
                            format!("export * as {} from '{}'", name.name(), decl.source.value)
                        }
                        None => format!("export * from '{}'", decl.source.value),
                    };
                    return Err(self.unsupported(
                        format!("export all declaration ({})", construct),
                        decl.span,
                    ));
                }
                Statement::TSExportAssignment(decl) => {
                    return Err(self.unsupported("export assignment (export =)", decl.span));
                }
                Statement::TSNamespaceExportDeclaration(decl) => {
                    return Err(self.unsupported("export as namespace", decl.span));
                }
                Statement::ExportDefaultDeclaration(decl) => {
                    if let Some(assignment) = self.rewrite_default_export(decl.unbox())? {
                        body.push(assignment);
                    }
                }
                Statement::ExportNamedDeclaration(decl) => {
                    self.rewrite_named_export(decl.unbox(), &mut body)?;
                }
                other => body.push(other),
            }
        }

        program.body = self.isolate(body, receiver);
        debug!(
            file = %self.unit.path,
            exports = self.exports.len(),
            "unit wrapped"
        );

        Ok(RewriteSummary {
            wrapped: true,
            exports: self.exports,
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // default export
    // ───────────────────────────────────────────────────────────────────────────

    fn rewrite_default_export(
        &mut self,
        decl: ExportDefaultDeclaration<'a>,
    ) -> Result<Option<Statement<'a>>, ExposeError> {
        let line = self.line_of(decl.span);
        let value = match decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(mut func) => {
                // Overload signatures carry no value.
                if func.body.is_none() {
                    return Ok(None);
                }
                func.r#type = FunctionType::FunctionExpression;
                Expression::FunctionExpression(func)
            }
            ExportDefaultDeclarationKind::ClassDeclaration(mut class) => {
                class.r#type = ClassType::ClassExpression;
                Expression::ClassExpression(class)
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => return Ok(None),
            kind => kind.into_expression(),
        };

        let name = default_export_name(&value).map_err(|reason| {
            self.unnameable("default export", reason, line)
        })?;
        let assignment = self.export_assignment(&name, value, line)?;
        Ok(Some(assignment))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // named export
    // ───────────────────────────────────────────────────────────────────────────

    fn rewrite_named_export(
        &mut self,
        decl: ExportNamedDeclaration<'a>,
        out: &mut ArenaVec<'a, Statement<'a>>,
    ) -> Result<(), ExposeError> {
        if let Some(source) = &decl.source {
            return Err(self.unsupported(
                format!("re-export declaration (export {{ ... }} from '{}')", source.value),
                decl.span,
            ));
        }

        if let Some(declaration) = decl.declaration {
            let mut bindings = Vec::new();
            collect_declared_bindings(&declaration, &mut bindings);
            out.push(Statement::from(declaration));
            for (name, span) in bindings {
                let line = self.line_of(span);
                let value = self.identifier(&name);
                let assignment = self.export_assignment(&name, value, line)?;
                out.push(assignment);
            }
            return Ok(());
        }

        if decl.export_kind.is_type() {
            return Ok(());
        }

        for specifier in &decl.specifiers {
            if specifier.export_kind.is_type() {
                continue;
            }
            let line = self.line_of(specifier.span);
            let exported = specifier.exported.name().to_string();
            if !is_identifier_name(&exported) {
                return Err(self.unnameable(
                    &format!("export \"{}\"", exported),
                    UnnameableReason::InvalidName,
                    line,
                ));
            }
            let local = specifier.local.name().to_string();
            let value = self.identifier(&local);
            let assignment = self.export_assignment(&exported, value, line)?;
            out.push(assignment);
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // node builders
    // ───────────────────────────────────────────────────────────────────────────

    /// Claims `name` and builds `this.<name> = <value>;`.
    fn export_assignment(
        &mut self,
        name: &str,
        value: Expression<'a>,
        line: Line,
    ) -> Result<Statement<'a>, ExposeError> {
        self.registry
            .claim(name, ExportSite::new(self.unit.path.as_str(), line))?;
        self.exports.push(ExportRecord {
            name: name.to_string(),
            line,
        });

        let name_atom: &'a str = self.ast.allocator.alloc_str(name);
        let member = self.ast.member_expression_static(
            SPAN,
            self.ast.expression_this(SPAN),
            self.ast.identifier_name(SPAN, name_atom),
            false,
        );
        let left = SimpleAssignmentTarget::from(member);
        let assignment = self.ast.expression_assignment(
            SPAN,
            AssignmentOperator::Assign,
            AssignmentTarget::from(left),
            value,
        );
        Ok(self.ast.statement_expression(SPAN, assignment))
    }

    fn identifier(&self, name: &str) -> Expression<'a> {
        let name_atom: &'a str = self.ast.allocator.alloc_str(name);
        self.ast.expression_identifier(SPAN, name_atom)
    }

    /// `this`, or the identifier chain of a global target.
    fn receiver(&self) -> Result<Expression<'a>, ExposeError> {
        self.target.validate()?;
        let path = match self.target {
            ExportTarget::This => return Ok(self.ast.expression_this(SPAN)),
            ExportTarget::Global(path) => path.as_str(),
        };

        let mut segments = path.split('.');
        let root = segments.next().unwrap_or(path);
        let mut receiver = self.identifier(root);
        for segment in segments {
            let segment: &'a str = self.ast.allocator.alloc_str(segment);
            receiver = Expression::from(self.ast.member_expression_static(
                SPAN,
                receiver,
                self.ast.identifier_name(SPAN, segment),
                false,
            ));
        }
        Ok(receiver)
    }

    /// Builds `(function () { <body> }).call(<receiver>);`.
    fn isolate(
        &self,
        body: ArenaVec<'a, Statement<'a>>,
        receiver: Expression<'a>,
    ) -> ArenaVec<'a, Statement<'a>> {
        let params = self.ast.alloc_formal_parameters(
            SPAN,
            FormalParameterKind::FormalParameter,
            self.ast.vec(),
            None::<ArenaBox<FormalParameterRest>>,
        );
        let function_body = self.ast.alloc_function_body(SPAN, self.ast.vec(), body);
        let function = self.ast.expression_function(
            SPAN,
            FunctionType::FunctionExpression,
            None,
            false,
            false,
            false,
            None::<ArenaBox<TSTypeParameterDeclaration>>,
            None::<ArenaBox<TSThisParameter>>,
            params,
            None::<ArenaBox<TSTypeAnnotation>>,
            Some(function_body),
        );

        let callee = Expression::from(self.ast.member_expression_static(
            SPAN,
            self.ast.expression_parenthesized(SPAN, function),
            self.ast.identifier_name(SPAN, "call"),
            false,
        ));
        let mut args = self.ast.vec();
        args.push(Argument::from(receiver));
        let call = self.ast.expression_call(
            SPAN,
            callee,
            None::<ArenaBox<TSTypeParameterInstantiation>>,
            args,
            false,
        );

        let mut wrapped = self.ast.vec_with_capacity(1);
        wrapped.push(self.ast.statement_expression(SPAN, call));
        wrapped
    }

    // ───────────────────────────────────────────────────────────────────────────
    // diagnostics
    // ───────────────────────────────────────────────────────────────────────────

    fn line_of(&self, span: Span) -> Line {
        if self.source_text.is_empty() {
            return Line::UNKNOWN;
        }
        Line::at(self.source_text, span.start)
    }

    fn unsupported(&self, construct: impl Into<String>, span: Span) -> ExposeError {
        ExposeError::UnsupportedConstruct {
            construct: construct.into(),
            file: self.unit.path.clone(),
            line: self.line_of(span),
        }
    }

    fn unnameable(&self, name_hint: &str, reason: UnnameableReason, line: Line) -> ExposeError {
        ExposeError::UnnameableExport {
            name_hint: name_hint.to_string(),
            reason,
            file: self.unit.path.clone(),
            line,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAME DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

fn default_export_name(value: &Expression<'_>) -> Result<String, UnnameableReason> {
    match value.get_inner_expression() {
        Expression::Identifier(ident) => Ok(ident.name.to_string()),
        Expression::FunctionExpression(func) => func
            .id
            .as_ref()
            .map(|id| id.name.to_string())
            .ok_or(UnnameableReason::Anonymous),
        Expression::ClassExpression(class) => class
            .id
            .as_ref()
            .map(|id| id.name.to_string())
            .ok_or(UnnameableReason::Anonymous),
        Expression::ArrowFunctionExpression(_) => Err(UnnameableReason::Anonymous),
        Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BigIntLiteral(_)
        | Expression::RegExpLiteral(_)
        | Expression::StringLiteral(_) => Err(UnnameableReason::Literal),
        Expression::TemplateLiteral(template) if template.expressions.is_empty() => {
            Err(UnnameableReason::Literal)
        }
        _ => Err(UnnameableReason::Expression),
    }
}

/// Runtime bindings introduced by an exported declaration, in source order.
/// Type-only and ambient declarations introduce none.
fn collect_declared_bindings(declaration: &Declaration<'_>, bindings: &mut Vec<(String, Span)>) {
    match declaration {
        Declaration::VariableDeclaration(var_decl) => {
            if var_decl.declare {
                return;
            }
            for declarator in &var_decl.declarations {
                collect_binding_pattern(&declarator.id, bindings);
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if func.declare || func.body.is_none() {
                return;
            }
            if let Some(id) = &func.id {
                bindings.push((id.name.to_string(), id.span));
            }
        }
        Declaration::ClassDeclaration(class) => {
            if class.declare {
                return;
            }
            if let Some(id) = &class.id {
                bindings.push((id.name.to_string(), id.span));
            }
        }
        Declaration::TSEnumDeclaration(enum_decl) => {
            if !enum_decl.declare && !enum_decl.r#const {
                bindings.push((enum_decl.id.name.to_string(), enum_decl.id.span));
            }
        }
        _ => {}
    }
}

fn collect_binding_pattern(pattern: &BindingPattern<'_>, bindings: &mut Vec<(String, Span)>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            bindings.push((id.name.to_string(), id.span));
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, bindings);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, bindings);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_pattern(pattern, bindings);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, bindings);
            }
        }
        BindingPattern::AssignmentPattern(assign) => {
            collect_binding_pattern(&assign.left, bindings);
        }
    }
}

/// Convenience entry point: rewrites `program` against `registry`.
pub fn expose_program<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    unit: &UnitContext,
    registry: &ExportRegistry,
    target: &ExportTarget,
) -> Result<RewriteSummary, ExposeError> {
    ExportRewriter::new(allocator, registry, unit, target).rewrite_program(program)
}
