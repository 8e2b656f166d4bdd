//! Abstract syntax tree produced by the parser
//!
//! Every node carries the span of the source text it was parsed from; spans
//! are copied by value so the tree never borrows the source buffer. The
//! `Display` impls render a canonical form (explicit parentheses, one
//! declaration per line) that re-parses to the same tree shape.

use orizon_core::span::Span;

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub span: Span,
}

impl Program {
    pub fn new(span: Span) -> Self {
        Program {
            declarations: Vec::new(),
            span,
        }
    }
}

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
//                              DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Function(Function),
    Variable(Variable),
    Struct(StructDecl),
    Enum(EnumDecl),
    Trait(TraitDecl),
    Impl(ImplBlock),
    TypeAlias(TypeAlias),
    NewType(NewType),
    Import(Import),
    Export(Export),
    MacroDefinition(MacroDefinition),
}

impl Declaration {
    pub fn span(&self) -> Span {
        match self {
            Declaration::Function(d) => d.span,
            Declaration::Variable(d) => d.span,
            Declaration::Struct(d) => d.span,
            Declaration::Enum(d) => d.span,
            Declaration::Trait(d) => d.span,
            Declaration::Impl(d) => d.span,
            Declaration::TypeAlias(d) => d.span,
            Declaration::NewType(d) => d.span,
            Declaration::Import(d) => d.span,
            Declaration::Export(d) => d.span,
            Declaration::MacroDefinition(d) => d.span,
        }
    }

    /// Declared name, when the declaration has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Function(d) => Some(&d.name.name),
            Declaration::Variable(d) => Some(&d.name.name),
            Declaration::Struct(d) => Some(&d.name.name),
            Declaration::Enum(d) => Some(&d.name.name),
            Declaration::Trait(d) => Some(&d.name.name),
            Declaration::Impl(_) => None,
            Declaration::TypeAlias(d) => Some(&d.name.name),
            Declaration::NewType(d) => Some(&d.name.name),
            Declaration::Import(d) => d.path.last().map(|i| i.name.as_str()),
            Declaration::Export(d) => d.path.last().map(|i| i.name.as_str()),
            Declaration::MacroDefinition(d) => Some(&d.name.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    pub name: Ident,
    pub bounds: Vec<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub target: Type,
    pub bounds: Vec<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub where_clauses: Vec<WhereClause>,
    pub body: Block,
    pub is_public: bool,
    pub span: Span,
}

/// Binding kind for variable declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Let,
    Var,
    Const,
}

impl BindingKind {
    pub fn keyword(self) -> &'static str {
        match self {
            BindingKind::Let => "let",
            BindingKind::Var => "var",
            BindingKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub kind: BindingKind,
    pub name: Ident,
    pub ty: Option<Type>,
    pub initializer: Option<Expression>,
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: Type,
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub fields: Vec<Field>,
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantFields {
    Unit,
    Tuple(Vec<Type>),
    Named(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: Ident,
    pub fields: VariantFields,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<Variant>,
    pub is_public: bool,
    pub span: Span,
}

/// A method signature inside a trait body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub bounds: Vec<Type>,
    pub methods: Vec<MethodSig>,
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplBlock {
    pub generics: Vec<GenericParam>,
    /// `Some` for `impl Trait for Type`, `None` for inherent impls.
    pub trait_type: Option<Type>,
    pub target_type: Type,
    pub where_clauses: Vec<WhereClause>,
    pub methods: Vec<Function>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAlias {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewType {
    pub name: Ident,
    pub generics: Vec<GenericParam>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: Vec<Ident>,
    pub alias: Option<Ident>,
    /// `import a::b::*`
    pub glob: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub path: Vec<Ident>,
    pub alias: Option<Ident>,
    pub glob: bool,
    pub span: Span,
}

/// One alternative of a macro: parameter names and a template body.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroRule {
    pub params: Vec<Ident>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDefinition {
    pub name: Ident,
    pub rules: Vec<MacroRule>,
    pub span: Span,
}

// ============================================================================
//                               STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block(Block),
    Expression(ExpressionStmt),
    Return(ReturnStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    VariableDecl(Variable),
    Break(Span),
    Continue(Span),
    Throw(ThrowStmt),
    TryCatch(TryCatchStmt),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Block(b) => b.span,
            Statement::Expression(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::If(s) => s.span,
            Statement::While(s) => s.span,
            Statement::For(s) => s.span,
            Statement::VariableDecl(v) => v.span,
            Statement::Break(span) | Statement::Continue(span) => *span,
            Statement::Throw(s) => s.span,
            Statement::TryCatch(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStmt {
    pub expr: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expression,
    pub then_block: Block,
    /// `Statement::If` for `else if`, `Statement::Block` for a plain else.
    pub else_branch: Option<Box<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub binding: Ident,
    pub iterable: Expression,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStmt {
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryCatchStmt {
    pub try_block: Block,
    pub catch_binding: Option<Ident>,
    pub catch_block: Block,
    pub span: Span,
}

// ============================================================================
//                              EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Ref,
    RefMut,
    Deref,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Ref => "&",
            UnaryOp::RefMut => "&mut ",
            UnaryOp::Deref => "*",
        }
    }
}

/// Compound-assignment operators desugar at MIR lowering, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }

    /// The binary operation a compound assignment applies, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer(i64),
    Float(f64),
    Str(String),
    /// Content after lex-level escape consumption; may be more than one
    /// char for unprocessed escapes.
    Char(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Assign(AssignExpr),
    Call(CallExpr),
    Member(MemberExpr),
    Index(IndexExpr),
    Cast(CastExpr),
    Try(TryExpr),
    Literal(Literal),
    Identifier(Ident),
    Array(ArrayExpr),
    StructLiteral(StructLiteralExpr),
    MacroInvocation(MacroInvocationExpr),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Binary(e) => e.span,
            Expression::Unary(e) => e.span,
            Expression::Assign(e) => e.span,
            Expression::Call(e) => e.span,
            Expression::Member(e) => e.span,
            Expression::Index(e) => e.span,
            Expression::Cast(e) => e.span,
            Expression::Try(e) => e.span,
            Expression::Literal(e) => e.span,
            Expression::Identifier(e) => e.span,
            Expression::Array(e) => e.span,
            Expression::StructLiteral(e) => e.span,
            Expression::MacroInvocation(e) => e.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub op: AssignOp,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expression>,
    pub args: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub object: Box<Expression>,
    pub member: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub object: Box<Expression>,
    pub index: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    pub expr: Box<Expression>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryExpr {
    pub expr: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpr {
    pub elements: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructLiteralExpr {
    pub name: Ident,
    pub fields: Vec<(Ident, Expression)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroInvocationExpr {
    pub name: Ident,
    pub args: Vec<Expression>,
    pub span: Span,
}

// ============================================================================
//                                 TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Primitive or user-defined name, optionally with generic arguments.
    Named(NamedType),
    Reference(RefType),
    Pointer(PtrType),
    Array(ArrayType),
    Function(FnType),
}

impl Type {
    pub fn span(&self) -> Span {
        match self {
            Type::Named(t) => t.span,
            Type::Reference(t) => t.span,
            Type::Pointer(t) => t.span,
            Type::Array(t) => t.span,
            Type::Function(t) => t.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    pub name: Ident,
    pub generics: Vec<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefType {
    pub lifetime: Option<Ident>,
    pub mutable: bool,
    pub inner: Box<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PtrType {
    pub mutable: bool,
    pub inner: Box<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub element: Box<Type>,
    pub size: u64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnType {
    pub params: Vec<Type>,
    pub ret: Option<Box<Type>>,
    pub span: Span,
}

// ============================================================================
//                        CANONICAL RENDERING
// ============================================================================

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Named(t) => {
                write!(f, "{}", t.name)?;
                if !t.generics.is_empty() {
                    write!(f, "<")?;
                    for (i, g) in t.generics.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", g)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Reference(t) => {
                write!(f, "&")?;
                if let Some(lt) = &t.lifetime {
                    write!(f, "'{}' ", lt)?;
                }
                if t.mutable {
                    write!(f, "mut ")?;
                }
                write!(f, "{}", t.inner)
            }
            Type::Pointer(t) => {
                write!(f, "*")?;
                if t.mutable {
                    write!(f, "mut ")?;
                }
                write!(f, "{}", t.inner)
            }
            Type::Array(t) => write!(f, "[{}; {}]", t.element, t.size),
            Type::Function(t) => {
                write!(f, "fn(")?;
                for (i, p) in t.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")?;
                if let Some(ret) = &t.ret {
                    write!(f, " -> {}", ret)?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Binary(e) => {
                write!(f, "({} {} {})", e.left, e.op.symbol(), e.right)
            }
            Expression::Unary(e) => write!(f, "({}{})", e.op.symbol(), e.operand),
            Expression::Assign(e) => {
                write!(f, "({} {} {})", e.target, e.op.symbol(), e.value)
            }
            Expression::Call(e) => {
                write!(f, "{}(", e.callee)?;
                for (i, a) in e.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expression::Member(e) => write!(f, "{}.{}", e.object, e.member),
            Expression::Index(e) => write!(f, "{}[{}]", e.object, e.index),
            Expression::Cast(e) => write!(f, "({} as {})", e.expr, e.ty),
            Expression::Try(e) => write!(f, "{}?", e.expr),
            Expression::Literal(l) => match &l.value {
                LiteralValue::Integer(v) => write!(f, "{}", v),
                LiteralValue::Float(v) => {
                    if v.fract() == 0.0 && v.is_finite() {
                        write!(f, "{:.1}", v)
                    } else {
                        write!(f, "{}", v)
                    }
                }
                LiteralValue::Str(s) => {
                    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                }
                LiteralValue::Char(c) => write!(f, "'{}'", c),
                LiteralValue::Bool(b) => write!(f, "{}", b),
            },
            Expression::Identifier(i) => write!(f, "{}", i),
            Expression::Array(e) => {
                write!(f, "[")?;
                for (i, el) in e.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", el)?;
                }
                write!(f, "]")
            }
            Expression::StructLiteral(e) => {
                write!(f, "{} {{ ", e.name)?;
                for (i, (name, value)) in e.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            Expression::MacroInvocation(e) => {
                write!(f, "{}!(", e.name)?;
                for (i, a) in e.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_generics(f: &mut std::fmt::Formatter<'_>, generics: &[GenericParam]) -> std::fmt::Result {
    if generics.is_empty() {
        return Ok(());
    }
    write!(f, "<")?;
    for (i, g) in generics.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", g.name)?;
        for (j, b) in g.bounds.iter().enumerate() {
            write!(f, "{}{}", if j == 0 { ": " } else { " + " }, b)?;
        }
    }
    write!(f, ">")
}

fn write_where(f: &mut std::fmt::Formatter<'_>, clauses: &[WhereClause]) -> std::fmt::Result {
    if clauses.is_empty() {
        return Ok(());
    }
    write!(f, " where ")?;
    for (i, w) in clauses.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", w.target)?;
        for (j, b) in w.bounds.iter().enumerate() {
            write!(f, "{}{}", if j == 0 { ": " } else { " + " }, b)?;
        }
    }
    Ok(())
}

fn write_params(f: &mut std::fmt::Formatter<'_>, params: &[Param]) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", p.name)?;
        if let Some(ty) = &p.ty {
            write!(f, ": {}", ty)?;
        }
    }
    write!(f, ")")
}

fn write_path(
    f: &mut std::fmt::Formatter<'_>,
    path: &[Ident],
    glob: bool,
    alias: &Option<Ident>,
) -> std::fmt::Result {
    for (i, seg) in path.iter().enumerate() {
        if i > 0 {
            write!(f, "::")?;
        }
        write!(f, "{}", seg)?;
    }
    if glob {
        write!(f, "::*")?;
    }
    if let Some(alias) = alias {
        write!(f, " as {}", alias)?;
    }
    Ok(())
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{")?;
        for stmt in &self.statements {
            writeln!(f, "{}", stmt)?;
        }
        write!(f, "}}")
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Block(b) => write!(f, "{}", b),
            Statement::Expression(s) => write!(f, "{};", s.expr),
            Statement::Return(s) => match &s.value {
                Some(v) => write!(f, "return {};", v),
                None => write!(f, "return;"),
            },
            Statement::If(s) => {
                write!(f, "if {} {}", s.condition, s.then_block)?;
                if let Some(else_branch) = &s.else_branch {
                    write!(f, " else {}", else_branch)?;
                }
                Ok(())
            }
            Statement::While(s) => write!(f, "while {} {}", s.condition, s.body),
            Statement::For(s) => write!(f, "for {} in {} {}", s.binding, s.iterable, s.body),
            Statement::VariableDecl(v) => write!(f, "{}", VariableDisplay(v)),
            Statement::Break(_) => write!(f, "break;"),
            Statement::Continue(_) => write!(f, "continue;"),
            Statement::Throw(s) => write!(f, "throw {};", s.value),
            Statement::TryCatch(s) => {
                write!(f, "try {} catch", s.try_block)?;
                if let Some(binding) = &s.catch_binding {
                    write!(f, " ({})", binding)?;
                }
                write!(f, " {}", s.catch_block)
            }
        }
    }
}

/// Shared rendering for top-level and statement-position variables.
struct VariableDisplay<'a>(&'a Variable);

impl std::fmt::Display for VariableDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        if v.is_public {
            write!(f, "pub ")?;
        }
        write!(f, "{} {}", v.kind.keyword(), v.name)?;
        if let Some(ty) = &v.ty {
            write!(f, ": {}", ty)?;
        }
        if let Some(init) = &v.initializer {
            write!(f, " = {}", init)?;
        }
        write!(f, ";")
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_public {
            write!(f, "pub ")?;
        }
        write!(f, "func {}", self.name)?;
        write_generics(f, &self.generics)?;
        write_params(f, &self.params)?;
        if let Some(ret) = &self.return_type {
            write!(f, " -> {}", ret)?;
        }
        write_where(f, &self.where_clauses)?;
        write!(f, " {}", self.body)
    }
}

impl std::fmt::Display for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Declaration::Function(d) => write!(f, "{}", d),
            Declaration::Variable(v) => write!(f, "{}", VariableDisplay(v)),
            Declaration::Struct(d) => {
                if d.is_public {
                    write!(f, "pub ")?;
                }
                write!(f, "struct {}", d.name)?;
                write_generics(f, &d.generics)?;
                writeln!(f, " {{")?;
                for field in &d.fields {
                    if field.is_public {
                        write!(f, "pub ")?;
                    }
                    writeln!(f, "{}: {},", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            Declaration::Enum(d) => {
                if d.is_public {
                    write!(f, "pub ")?;
                }
                write!(f, "enum {}", d.name)?;
                write_generics(f, &d.generics)?;
                writeln!(f, " {{")?;
                for variant in &d.variants {
                    write!(f, "{}", variant.name)?;
                    match &variant.fields {
                        VariantFields::Unit => {}
                        VariantFields::Tuple(types) => {
                            write!(f, "(")?;
                            for (i, t) in types.iter().enumerate() {
                                if i > 0 {
                                    write!(f, ", ")?;
                                }
                                write!(f, "{}", t)?;
                            }
                            write!(f, ")")?;
                        }
                        VariantFields::Named(fields) => {
                            write!(f, " {{ ")?;
                            for field in fields {
                                write!(f, "{}: {}, ", field.name, field.ty)?;
                            }
                            write!(f, "}}")?;
                        }
                    }
                    writeln!(f, ",")?;
                }
                write!(f, "}}")
            }
            Declaration::Trait(d) => {
                if d.is_public {
                    write!(f, "pub ")?;
                }
                write!(f, "trait {}", d.name)?;
                write_generics(f, &d.generics)?;
                for (i, b) in d.bounds.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { ": " } else { " + " }, b)?;
                }
                writeln!(f, " {{")?;
                for m in &d.methods {
                    write!(f, "func {}", m.name)?;
                    write_generics(f, &m.generics)?;
                    write_params(f, &m.params)?;
                    if let Some(ret) = &m.return_type {
                        write!(f, " -> {}", ret)?;
                    }
                    writeln!(f, ";")?;
                }
                write!(f, "}}")
            }
            Declaration::Impl(d) => {
                write!(f, "impl")?;
                write_generics(f, &d.generics)?;
                write!(f, " ")?;
                if let Some(trait_type) = &d.trait_type {
                    write!(f, "{} for ", trait_type)?;
                }
                write!(f, "{}", d.target_type)?;
                write_where(f, &d.where_clauses)?;
                writeln!(f, " {{")?;
                for m in &d.methods {
                    writeln!(f, "{}", m)?;
                }
                write!(f, "}}")
            }
            Declaration::TypeAlias(d) => {
                write!(f, "type {}", d.name)?;
                write_generics(f, &d.generics)?;
                write!(f, " = {};", d.ty)
            }
            Declaration::NewType(d) => {
                write!(f, "newtype {}", d.name)?;
                write_generics(f, &d.generics)?;
                write!(f, " = {};", d.ty)
            }
            Declaration::Import(d) => {
                write!(f, "import ")?;
                write_path(f, &d.path, d.glob, &d.alias)?;
                write!(f, ";")
            }
            Declaration::Export(d) => {
                write!(f, "export ")?;
                write_path(f, &d.path, d.glob, &d.alias)?;
                write!(f, ";")
            }
            Declaration::MacroDefinition(d) => {
                write!(f, "macro {}(", d.name)?;
                let params = d.rules.first().map(|r| r.params.as_slice()).unwrap_or(&[]);
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                writeln!(f, ") {{")?;
                for rule in &d.rules {
                    for stmt in &rule.body {
                        writeln!(f, "{}", stmt)?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for decl in &self.declarations {
            writeln!(f, "{}", decl)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orizon_core::span::{Position, Span};

    fn sp() -> Span {
        Span::point(Position::start())
    }

    fn int(v: i64) -> Expression {
        Expression::Literal(Literal {
            value: LiteralValue::Integer(v),
            span: sp(),
        })
    }

    #[test]
    fn test_expression_display_parenthesizes() {
        let e = Expression::Binary(BinaryExpr {
            op: BinaryOp::Add,
            left: Box::new(int(1)),
            right: Box::new(Expression::Binary(BinaryExpr {
                op: BinaryOp::Mul,
                left: Box::new(int(2)),
                right: Box::new(int(3)),
                span: sp(),
            })),
            span: sp(),
        });
        assert_eq!(e.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn test_type_display() {
        let t = Type::Reference(RefType {
            lifetime: None,
            mutable: true,
            inner: Box::new(Type::Named(NamedType {
                name: Ident::new("Vec", sp()),
                generics: vec![Type::Named(NamedType {
                    name: Ident::new("i64", sp()),
                    generics: vec![],
                    span: sp(),
                })],
                span: sp(),
            })),
            span: sp(),
        });
        assert_eq!(t.to_string(), "&mut Vec<i64>");
    }

    #[test]
    fn test_declaration_name() {
        let d = Declaration::Import(Import {
            path: vec![Ident::new("std", sp()), Ident::new("io", sp())],
            alias: None,
            glob: false,
            span: sp(),
        });
        assert_eq!(d.name(), Some("io"));
    }

    #[test]
    fn test_string_literal_display_escapes() {
        let e = Expression::Literal(Literal {
            value: LiteralValue::Str("a\"b\\c".to_string()),
            span: sp(),
        });
        assert_eq!(e.to_string(), "\"a\\\"b\\\\c\"");
    }
}
