//! Bridge between the parser AST and the core AST
//!
//! `to_core` and `from_core` are total, pure functions. For every program
//! whose declarations all fall in the core set,
//! `from_core(to_core(p)) == p` holds on spans, identifiers, generics,
//! fields, variants, and parameter names. Declarations outside the set pass
//! through as opaque items and are returned unchanged.

use crate::ast::{
    Declaration, Export, Function, Import, NewType, Program, TypeAlias, Variable,
};
use crate::core_ast::{
    CoreFunction, CoreItem, CoreProgram, CoreTypeDecl, CoreTypeKind, CoreVariable,
};

/// Whether a declaration participates in the round-trip contract.
pub fn is_core_representable(decl: &Declaration) -> bool {
    matches!(
        decl,
        Declaration::Function(_)
            | Declaration::Variable(_)
            | Declaration::TypeAlias(_)
            | Declaration::NewType(_)
            | Declaration::Import(_)
            | Declaration::Export(_)
    )
}

pub fn to_core(program: Program) -> CoreProgram {
    let span = program.span;
    let items = program
        .declarations
        .into_iter()
        .map(|decl| match decl {
            Declaration::Function(f) => CoreItem::Function(CoreFunction {
                name: f.name,
                generics: f.generics,
                params: f.params,
                return_type: f.return_type,
                where_clauses: f.where_clauses,
                body: f.body,
                is_public: f.is_public,
                span: f.span,
            }),
            Declaration::Variable(v) => CoreItem::Variable(CoreVariable {
                kind: v.kind,
                name: v.name,
                ty: v.ty,
                initializer: v.initializer,
                is_public: v.is_public,
                span: v.span,
            }),
            Declaration::TypeAlias(t) => CoreItem::Type(CoreTypeDecl {
                kind: CoreTypeKind::Alias,
                name: t.name,
                generics: t.generics,
                ty: t.ty,
                span: t.span,
            }),
            Declaration::NewType(t) => CoreItem::Type(CoreTypeDecl {
                kind: CoreTypeKind::Newtype,
                name: t.name,
                generics: t.generics,
                ty: t.ty,
                span: t.span,
            }),
            Declaration::Import(i) => CoreItem::Import(i),
            Declaration::Export(e) => CoreItem::Export(e),
            other => CoreItem::Opaque(other),
        })
        .collect();
    CoreProgram { items, span }
}

pub fn from_core(core: CoreProgram) -> Program {
    let mut program = Program::new(core.span);
    program.declarations = core
        .items
        .into_iter()
        .map(|item| match item {
            CoreItem::Function(f) => Declaration::Function(Function {
                name: f.name,
                generics: f.generics,
                params: f.params,
                return_type: f.return_type,
                where_clauses: f.where_clauses,
                body: f.body,
                is_public: f.is_public,
                span: f.span,
            }),
            CoreItem::Variable(v) => Declaration::Variable(Variable {
                kind: v.kind,
                name: v.name,
                ty: v.ty,
                initializer: v.initializer,
                is_public: v.is_public,
                span: v.span,
            }),
            CoreItem::Type(t) => match t.kind {
                CoreTypeKind::Alias => Declaration::TypeAlias(TypeAlias {
                    name: t.name,
                    generics: t.generics,
                    ty: t.ty,
                    span: t.span,
                }),
                CoreTypeKind::Newtype => Declaration::NewType(NewType {
                    name: t.name,
                    generics: t.generics,
                    ty: t.ty,
                    span: t.span,
                }),
            },
            CoreItem::Import(i) => Declaration::Import(i),
            CoreItem::Export(e) => Declaration::Export(e),
            CoreItem::Opaque(d) => d,
        })
        .collect();
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn round_trip(source: &str) {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{:?}", errors);
        let restored = from_core(to_core(program.clone()));
        assert_eq!(program, restored);
    }

    #[test]
    fn test_round_trip_core_declarations() {
        round_trip(
            r#"
import std::io as io;
export math::*;
pub func add<T: Num>(a: T, b: T) -> T where T: Num { return a + b; }
let answer: i64 = 42;
var counter = 0;
const LIMIT = 1000;
type Pair<T> = Vec<T>;
newtype Meters = f64;
"#,
        );
    }

    #[test]
    fn test_round_trip_preserves_spans_and_order() {
        let (program, _) = parse_source("let a = 1;\nfunc b() { }\ntype C = D;");
        let spans: Vec<_> = program.declarations.iter().map(|d| d.span()).collect();
        let restored = from_core(to_core(program));
        let restored_spans: Vec<_> = restored.declarations.iter().map(|d| d.span()).collect();
        assert_eq!(spans, restored_spans);
        let names: Vec<_> = restored
            .declarations
            .iter()
            .filter_map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["a", "b", "C"]);
    }

    #[test]
    fn test_opaque_declarations_pass_through() {
        round_trip(
            r#"
struct S { x: i64 }
enum E { A, B }
trait T { func m() -> i64; }
impl T for S { func m() -> i64 { return 1; } }
macro noop() { }
func user() { }
"#,
        );
    }

    #[test]
    fn test_representability() {
        let (program, _) = parse_source("func f() { }\nstruct S { x: i64 }");
        assert!(is_core_representable(&program.declarations[0]));
        assert!(!is_core_representable(&program.declarations[1]));
    }

    #[test]
    fn test_empty_program() {
        round_trip("");
    }
}
