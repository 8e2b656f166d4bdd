//! High-level IR
//!
//! The HIR reorganizes the core AST into modules: ordered declarations plus
//! the module's impl records. Impl targets are referenced by type name, not
//! by owning pointer; resolving the target to its declaration is a later
//! pass. Every node keeps its source span for diagnostics.

use crate::ast::{
    Block, EnumDecl, Export, Expression, GenericParam, Import, Param, Statement, StructDecl,
    TraitDecl, Type, WhereClause,
};
use crate::ast::{BindingKind, Declaration};
use crate::core_ast::{CoreItem, CoreProgram, CoreTypeDecl};
use orizon_core::span::Span;
use std::collections::HashSet;

/// Effect annotation carried on functions. Attached from surface syntax,
/// never re-derived here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    Pure,
    Throws,
    Io,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HirProgram {
    pub modules: Vec<HirModule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HirModule {
    pub name: String,
    pub declarations: Vec<HirDecl>,
    pub impls: Vec<HirImpl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HirDecl {
    Function(HirFunction),
    Variable(HirVariable),
    Type(CoreTypeDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Trait(TraitDecl),
    Import(Import),
    Export(Export),
}

impl HirDecl {
    pub fn name(&self) -> Option<&str> {
        match self {
            HirDecl::Function(f) => Some(&f.name),
            HirDecl::Variable(v) => Some(&v.name),
            HirDecl::Type(t) => Some(&t.name.name),
            HirDecl::Struct(s) => Some(&s.name.name),
            HirDecl::Enum(e) => Some(&e.name.name),
            HirDecl::Trait(t) => Some(&t.name.name),
            HirDecl::Import(i) => i.path.last().map(|s| s.name.as_str()),
            HirDecl::Export(e) => e.path.last().map(|s| s.name.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HirFunction {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub where_clauses: Vec<WhereClause>,
    pub body: Block,
    pub effect: Effect,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HirVariable {
    pub name: String,
    pub kind: BindingKind,
    pub ty: Option<Type>,
    pub initializer: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HirImplKind {
    Inherent,
    Trait,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HirImpl {
    pub kind: HirImplKind,
    pub generics: Vec<GenericParam>,
    pub where_clauses: Vec<WhereClause>,
    pub methods: Vec<HirFunction>,
    /// Target referenced by name; resolution is a later pass.
    pub target_type: String,
    pub trait_name: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HirError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for HirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.span.start.line, self.span.start.column, self.message
        )
    }
}

impl std::error::Error for HirError {}

/// Build a single-module HIR program from a core program.
///
/// Errors are fatal for the affected declaration only: the declaration is
/// dropped and building continues.
pub fn build_module(core: CoreProgram, module_name: &str) -> (HirProgram, Vec<HirError>) {
    let mut errors = Vec::new();
    let mut module = HirModule {
        name: module_name.to_string(),
        declarations: Vec::new(),
        impls: Vec::new(),
        span: core.span,
    };
    let mut macro_names: HashSet<String> = HashSet::new();

    for item in core.items {
        match item {
            CoreItem::Function(f) => {
                if let Some((name, span)) = find_macro_invocation(&f.body) {
                    errors.push(HirError {
                        message: format!("unresolved macro invocation '{}!'", name),
                        span,
                    });
                    continue;
                }
                let effect = effect_of(&f.body);
                module.declarations.push(HirDecl::Function(HirFunction {
                    name: f.name.name,
                    generics: f.generics,
                    params: f.params,
                    return_type: f.return_type,
                    where_clauses: f.where_clauses,
                    body: f.body,
                    effect,
                    span: f.span,
                }));
            }
            CoreItem::Variable(v) => {
                module.declarations.push(HirDecl::Variable(HirVariable {
                    name: v.name.name,
                    kind: v.kind,
                    ty: v.ty,
                    initializer: v.initializer,
                    span: v.span,
                }));
            }
            CoreItem::Type(t) => module.declarations.push(HirDecl::Type(t)),
            CoreItem::Import(i) => module.declarations.push(HirDecl::Import(i)),
            CoreItem::Export(e) => module.declarations.push(HirDecl::Export(e)),
            CoreItem::Opaque(decl) => match decl {
                Declaration::Struct(s) => module.declarations.push(HirDecl::Struct(s)),
                Declaration::Enum(e) => module.declarations.push(HirDecl::Enum(e)),
                Declaration::Trait(t) => module.declarations.push(HirDecl::Trait(t)),
                Declaration::Impl(imp) => {
                    let target_name = match &imp.target_type {
                        Type::Named(named) => named.name.name.clone(),
                        other => {
                            errors.push(HirError {
                                message: format!(
                                    "invalid impl target '{}': expected a named type",
                                    other
                                ),
                                span: other.span(),
                            });
                            continue;
                        }
                    };
                    let trait_name = match &imp.trait_type {
                        Some(Type::Named(named)) => Some(named.name.name.clone()),
                        Some(other) => {
                            errors.push(HirError {
                                message: format!(
                                    "invalid trait reference '{}': expected a named type",
                                    other
                                ),
                                span: other.span(),
                            });
                            continue;
                        }
                        None => None,
                    };
                    let kind = if trait_name.is_some() {
                        HirImplKind::Trait
                    } else {
                        HirImplKind::Inherent
                    };
                    let mut methods = Vec::new();
                    for method in imp.methods {
                        if let Some((name, span)) = find_macro_invocation(&method.body) {
                            errors.push(HirError {
                                message: format!("unresolved macro invocation '{}!'", name),
                                span,
                            });
                            continue;
                        }
                        let effect = effect_of(&method.body);
                        methods.push(HirFunction {
                            name: method.name.name,
                            generics: method.generics,
                            params: method.params,
                            return_type: method.return_type,
                            where_clauses: method.where_clauses,
                            body: method.body,
                            effect,
                            span: method.span,
                        });
                    }
                    module.impls.push(HirImpl {
                        kind,
                        generics: imp.generics,
                        where_clauses: imp.where_clauses,
                        methods,
                        target_type: target_name,
                        trait_name,
                        span: imp.span,
                    });
                }
                Declaration::MacroDefinition(def) => {
                    // Consumed by the expansion stage; only duplicates are
                    // worth reporting here.
                    if !macro_names.insert(def.name.name.clone()) {
                        errors.push(HirError {
                            message: format!("duplicate macro registration '{}'", def.name.name),
                            span: def.span,
                        });
                    }
                }
                other => {
                    errors.push(HirError {
                        message: "unsupported declaration".to_string(),
                        span: other.span(),
                    });
                }
            },
        }
    }

    (
        HirProgram {
            modules: vec![module],
        },
        errors,
    )
}

/// Syntactic effect attachment: a body that throws is `Throws`.
fn effect_of(body: &Block) -> Effect {
    if block_throws(body) {
        Effect::Throws
    } else {
        Effect::Pure
    }
}

fn block_throws(block: &Block) -> bool {
    block.statements.iter().any(statement_throws)
}

fn statement_throws(stmt: &Statement) -> bool {
    match stmt {
        Statement::Throw(_) => true,
        Statement::Block(b) => block_throws(b),
        Statement::If(s) => {
            block_throws(&s.then_block)
                || s.else_branch.as_deref().is_some_and(statement_throws)
        }
        Statement::While(s) => block_throws(&s.body),
        Statement::For(s) => block_throws(&s.body),
        Statement::TryCatch(s) => block_throws(&s.try_block) || block_throws(&s.catch_block),
        _ => false,
    }
}

/// First macro invocation left in a body, if any.
fn find_macro_invocation(block: &Block) -> Option<(String, Span)> {
    block.statements.iter().find_map(stmt_macro)
}

fn stmt_macro(stmt: &Statement) -> Option<(String, Span)> {
    match stmt {
        Statement::Block(b) => find_macro_invocation(b),
        Statement::Expression(s) => expr_macro(&s.expr),
        Statement::Return(s) => s.value.as_ref().and_then(expr_macro),
        Statement::If(s) => expr_macro(&s.condition)
            .or_else(|| find_macro_invocation(&s.then_block))
            .or_else(|| s.else_branch.as_deref().and_then(stmt_macro)),
        Statement::While(s) => {
            expr_macro(&s.condition).or_else(|| find_macro_invocation(&s.body))
        }
        Statement::For(s) => {
            expr_macro(&s.iterable).or_else(|| find_macro_invocation(&s.body))
        }
        Statement::VariableDecl(v) => v.initializer.as_ref().and_then(expr_macro),
        Statement::Throw(s) => expr_macro(&s.value),
        Statement::TryCatch(s) => {
            find_macro_invocation(&s.try_block).or_else(|| find_macro_invocation(&s.catch_block))
        }
        Statement::Break(_) | Statement::Continue(_) => None,
    }
}

fn expr_macro(expr: &Expression) -> Option<(String, Span)> {
    match expr {
        Expression::MacroInvocation(m) => Some((m.name.name.clone(), m.span)),
        Expression::Binary(e) => expr_macro(&e.left).or_else(|| expr_macro(&e.right)),
        Expression::Unary(e) => expr_macro(&e.operand),
        Expression::Assign(e) => expr_macro(&e.target).or_else(|| expr_macro(&e.value)),
        Expression::Call(e) => {
            expr_macro(&e.callee).or_else(|| e.args.iter().find_map(expr_macro))
        }
        Expression::Member(e) => expr_macro(&e.object),
        Expression::Index(e) => expr_macro(&e.object).or_else(|| expr_macro(&e.index)),
        Expression::Cast(e) => expr_macro(&e.expr),
        Expression::Try(e) => expr_macro(&e.expr),
        Expression::Array(e) => e.elements.iter().find_map(expr_macro),
        Expression::StructLiteral(e) => e.fields.iter().find_map(|(_, v)| expr_macro(v)),
        Expression::Literal(_) | Expression::Identifier(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::to_core;
    use crate::parser::parse_source;

    fn build(source: &str) -> (HirProgram, Vec<HirError>) {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{:?}", errors);
        build_module(to_core(program), "main")
    }

    #[test]
    fn test_module_aggregates_impls() {
        let (hir, errors) = build(
            r#"
struct Point { x: f64, y: f64 }
trait Area { func area() -> f64; }
impl Area for Point { func area() -> f64 { return 0.0; } }
impl Point { func origin() -> Point { return make(); } }
"#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let module = &hir.modules[0];
        assert_eq!(module.name, "main");
        assert_eq!(module.impls.len(), 2);
        assert_eq!(module.impls[0].kind, HirImplKind::Trait);
        assert_eq!(module.impls[0].target_type, "Point");
        assert_eq!(module.impls[0].trait_name.as_deref(), Some("Area"));
        assert_eq!(module.impls[1].kind, HirImplKind::Inherent);
        assert_eq!(module.impls[1].methods.len(), 1);
    }

    #[test]
    fn test_declaration_order_preserved() {
        let (hir, _) = build("let a = 1;\nfunc b() { }\ntype C = D;");
        let names: Vec<_> = hir.modules[0]
            .declarations
            .iter()
            .filter_map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["a", "b", "C"]);
    }

    #[test]
    fn test_unresolved_macro_is_declaration_fatal() {
        let (hir, errors) = build("func bad() { nope!(); }\nfunc good() { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("nope"));
        let names: Vec<_> = hir.modules[0]
            .declarations
            .iter()
            .filter_map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn test_invalid_impl_target() {
        let (hir, errors) = build("impl *i64 { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("invalid impl target"));
        assert!(hir.modules[0].impls.is_empty());
    }

    #[test]
    fn test_duplicate_macro_registration() {
        let (_, errors) = build("macro m() { }\nmacro m() { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate macro registration"));
    }

    #[test]
    fn test_effect_attachment() {
        let (hir, _) = build("func f() { throw 1; }\nfunc g() { }");
        let effects: Vec<_> = hir.modules[0]
            .declarations
            .iter()
            .filter_map(|d| match d {
                HirDecl::Function(f) => Some(f.effect),
                _ => None,
            })
            .collect();
        assert_eq!(effects, vec![Effect::Throws, Effect::Pure]);
    }
}
