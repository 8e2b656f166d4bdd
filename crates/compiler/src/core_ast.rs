//! Canonical core AST
//!
//! A declaration subset the rest of the pipeline treats as its stable input.
//! Items here are guaranteed to round-trip losslessly through the bridge:
//! functions, variables, type declarations (alias and newtype), imports and
//! exports. Struct/enum/trait/impl declarations stay parser-shaped and are
//! carried through as opaque items by identity.
//!
//! Leaf types (identifiers, generics, types, blocks) are shared with the
//! parser AST on purpose: the round-trip contract is bit-identical
//! reconstruction, so the bridge only reshapes the top level.

use crate::ast::{
    Block, Declaration, Export, GenericParam, Ident, Import, Param, Type, WhereClause,
};
use crate::ast::{BindingKind, Expression};
use orizon_core::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct CoreProgram {
    pub items: Vec<CoreItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreItem {
    Function(CoreFunction),
    Variable(CoreVariable),
    Type(CoreTypeDecl),
    Import(Import),
    Export(Export),
    /// Declarations outside the round-trip set, carried unchanged.
    Opaque(Declaration),
}

impl CoreItem {
    pub fn span(&self) -> Span {
        match self {
            CoreItem::Function(f) => f.span,
            CoreItem::Variable(v) => v.span,
            CoreItem::Type(t) => t.span,
            CoreItem::Import(i) => i.span,
            CoreItem::Export(e) => e.span,
            CoreItem::Opaque(d) => d.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreFunction {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub where_clauses: Vec<WhereClause>,
    pub body: Block,
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreVariable {
    pub kind: BindingKind,
    pub name: Ident,
    pub ty: Option<Type>,
    pub initializer: Option<Expression>,
    pub is_public: bool,
    pub span: Span,
}

/// Alias and newtype collapse into one kinded type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreTypeKind {
    Alias,
    Newtype,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreTypeDecl {
    pub kind: CoreTypeKind,
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub ty: Type,
    pub span: Span,
}
