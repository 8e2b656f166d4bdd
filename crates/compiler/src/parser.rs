//! Recursive-descent parser for Orizon
//!
//! Consumes the lexer's token stream and produces a [`Program`] plus the
//! list of parse diagnostics. The parser always returns a program: on any
//! mismatch it records an error and resynchronizes, declaration-level at the
//! top (skip to the next declaration keyword or balanced close brace) and
//! statement-level inside blocks (skip to `;` or `}` at the same depth).

use crate::ast::*;
use crate::lexer::Lexer;
use crate::recovery::LexicalError;
use orizon_core::span::Span;
use orizon_core::token::{Token, TokenKind};

/// Hints stop being produced once a parse consumes this many.
const SUGGESTION_BUDGET: usize = 20;

/// A parse diagnostic with the span of the offending token.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.span.start.line, self.span.start.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    lexical_errors: Vec<LexicalError>,
    suggestion_budget: usize,
}

impl Parser {
    /// Lex and parse from source text.
    pub fn from_source(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize();
        let lexical_errors = lexer.take_errors();
        let mut parser = Self::new(tokens);
        parser.lexical_errors = lexical_errors;
        parser
    }

    /// Parse a pre-lexed token stream. Newline and comment tokens are not
    /// grammar; they are filtered here.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Comment))
            .collect();
        if tokens.is_empty() {
            tokens.push(Token::new(
                TokenKind::Eof,
                "",
                Span::point(orizon_core::span::Position::start()),
            ));
        }
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
            lexical_errors: Vec::new(),
            suggestion_budget: SUGGESTION_BUDGET,
        }
    }

    /// Lexical errors carried over from `from_source`.
    pub fn lexical_errors(&self) -> &[LexicalError] {
        &self.lexical_errors
    }

    /// Parse a whole program. Declarations that parsed appear in source
    /// order even when errors were recorded.
    pub fn parse(mut self) -> (Program, Vec<ParseError>) {
        let start_span = self
            .tokens
            .first()
            .map(|t| t.span)
            .unwrap_or_else(|| Span::point(orizon_core::span::Position::start()));
        let mut program = Program::new(start_span);

        while !self.at_end() {
            // Stray semicolons between declarations are tolerated.
            if self.check(TokenKind::Semicolon) {
                self.advance();
                continue;
            }
            match self.parse_declaration() {
                Ok(decl) => program.declarations.push(decl),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_declaration();
                }
            }
        }

        if let Some(last) = self.tokens.last() {
            program.span = program.span.merge(last.span);
        }
        (program, self.errors)
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_ident(&self, text: &str) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Identifier && tok.literal == text
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "expected {}, found {}",
                what,
                self.peek().kind.name()
            )))
        }
    }

    fn error_here(&mut self, message: String) -> ParseError {
        ParseError {
            message,
            span: self.peek().span,
            suggestion: None,
        }
    }

    fn error_with_hint(&mut self, message: String, hint: &str) -> ParseError {
        let suggestion = if self.suggestion_budget > 0 {
            self.suggestion_budget -= 1;
            Some(hint.to_string())
        } else {
            None
        };
        ParseError {
            message,
            span: self.peek().span,
            suggestion,
        }
    }

    fn ident(&mut self, what: &str) -> Result<Ident, ParseError> {
        let tok = self.expect(TokenKind::Identifier, what)?;
        Ok(Ident::new(tok.literal, tok.span))
    }

    /// Skip to the next declaration boundary after an error.
    fn synchronize_declaration(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            let kind = self.peek().kind;
            match kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    self.advance();
                    if depth <= 1 {
                        return;
                    }
                    depth -= 1;
                    continue;
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ if depth == 0 && kind.starts_declaration() => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Statement-level recovery: skip to `;` or `}` at the current depth.
    fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let is_public = self.matches(TokenKind::KwPub);
        let token = self.peek().clone();
        match token.kind {
            TokenKind::KwFunc => Ok(Declaration::Function(self.parse_function(is_public)?)),
            TokenKind::KwLet | TokenKind::KwVar | TokenKind::KwConst => {
                let var = self.parse_variable(is_public)?;
                Ok(Declaration::Variable(var))
            }
            TokenKind::KwStruct => Ok(Declaration::Struct(self.parse_struct(is_public)?)),
            TokenKind::KwEnum => Ok(Declaration::Enum(self.parse_enum(is_public)?)),
            TokenKind::KwTrait => Ok(Declaration::Trait(self.parse_trait(is_public)?)),
            TokenKind::KwImpl => Ok(Declaration::Impl(self.parse_impl()?)),
            TokenKind::KwType => Ok(Declaration::TypeAlias(self.parse_type_alias()?)),
            TokenKind::KwNewtype => Ok(Declaration::NewType(self.parse_newtype()?)),
            TokenKind::KwImport => {
                let (path, alias, glob, span) = self.parse_path_decl(TokenKind::KwImport)?;
                Ok(Declaration::Import(Import {
                    path,
                    alias,
                    glob,
                    span,
                }))
            }
            TokenKind::KwExport => {
                let (path, alias, glob, span) = self.parse_path_decl(TokenKind::KwExport)?;
                Ok(Declaration::Export(Export {
                    path,
                    alias,
                    glob,
                    span,
                }))
            }
            TokenKind::KwMacro => Ok(Declaration::MacroDefinition(self.parse_macro_def()?)),
            TokenKind::Error => {
                let err = self.error_here(format!("lexical error: {}", token.literal));
                self.advance();
                Err(err)
            }
            _ => {
                let err = self.error_with_hint(
                    format!("expected declaration, found {}", token.kind.name()),
                    "declarations start with func, let, struct, enum, trait, impl, type, \
                     newtype, import, export, or macro",
                );
                self.advance();
                Err(err)
            }
        }
    }

    fn parse_function(&mut self, is_public: bool) -> Result<Function, ParseError> {
        let start = self.expect(TokenKind::KwFunc, "`func`")?.span;
        let name = self.ident("function name")?;
        let generics = self.parse_generic_params()?;
        let params = self.parse_params()?;
        let return_type = if self.matches(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let where_clauses = self.parse_where_clauses()?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Ok(Function {
            name,
            generics,
            params,
            return_type,
            where_clauses,
            body,
            is_public,
            span,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) && !self.at_end() {
            let name = self.ident("parameter name")?;
            let ty = if self.matches(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let span = match &ty {
                Some(t) => name.span.merge(t.span()),
                None => name.span,
            };
            params.push(Param { name, ty, span });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn parse_variable(&mut self, is_public: bool) -> Result<Variable, ParseError> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::KwLet => BindingKind::Let,
            TokenKind::KwVar => BindingKind::Var,
            TokenKind::KwConst => BindingKind::Const,
            _ => unreachable!("caller checked the binding keyword"),
        };
        let name = self.ident("variable name")?;
        let ty = if self.matches(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let mut span = token.span.merge(name.span);
        if let Some(init) = &initializer {
            span = span.merge(init.span());
        }
        self.matches(TokenKind::Semicolon);
        Ok(Variable {
            kind,
            name,
            ty,
            initializer,
            is_public,
            span,
        })
    }

    fn parse_struct(&mut self, is_public: bool) -> Result<StructDecl, ParseError> {
        let start = self.expect(TokenKind::KwStruct, "`struct`")?.span;
        let name = self.ident("struct name")?;
        let generics = self.parse_generic_params()?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let field_public = self.matches(TokenKind::KwPub);
            let fname = self.ident("field name")?;
            self.expect(TokenKind::Colon, "`:` after field name")?;
            let ty = self.parse_type()?;
            let span = fname.span.merge(ty.span());
            fields.push(Field {
                name: fname,
                ty,
                is_public: field_public,
                span,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;
        self.matches(TokenKind::Semicolon);
        Ok(StructDecl {
            name,
            generics,
            fields,
            is_public,
            span: start.merge(end),
        })
    }

    fn parse_enum(&mut self, is_public: bool) -> Result<EnumDecl, ParseError> {
        let start = self.expect(TokenKind::KwEnum, "`enum`")?.span;
        let name = self.ident("enum name")?;
        let generics = self.parse_generic_params()?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut variants = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let vname = self.ident("variant name")?;
            let fields = if self.matches(TokenKind::LParen) {
                let mut types = Vec::new();
                while !self.check(TokenKind::RParen) && !self.at_end() {
                    types.push(self.parse_type()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "`)`")?;
                VariantFields::Tuple(types)
            } else if self.matches(TokenKind::LBrace) {
                let mut named = Vec::new();
                while !self.check(TokenKind::RBrace) && !self.at_end() {
                    let fname = self.ident("field name")?;
                    self.expect(TokenKind::Colon, "`:` after field name")?;
                    let ty = self.parse_type()?;
                    let span = fname.span.merge(ty.span());
                    named.push(Field {
                        name: fname,
                        ty,
                        is_public: false,
                        span,
                    });
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "`}`")?;
                VariantFields::Named(named)
            } else {
                VariantFields::Unit
            };
            let span = vname.span;
            variants.push(Variant {
                name: vname,
                fields,
                span,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;
        self.matches(TokenKind::Semicolon);
        Ok(EnumDecl {
            name,
            generics,
            variants,
            is_public,
            span: start.merge(end),
        })
    }

    fn parse_trait(&mut self, is_public: bool) -> Result<TraitDecl, ParseError> {
        let start = self.expect(TokenKind::KwTrait, "`trait`")?.span;
        let name = self.ident("trait name")?;
        let generics = self.parse_generic_params()?;
        let mut bounds = Vec::new();
        if self.matches(TokenKind::Colon) {
            loop {
                bounds.push(self.parse_type()?);
                if !self.matches(TokenKind::Plus) {
                    break;
                }
            }
        }
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let mstart = self.expect(TokenKind::KwFunc, "`func` in trait body")?.span;
            let mname = self.ident("method name")?;
            let mgenerics = self.parse_generic_params()?;
            let mparams = self.parse_params()?;
            let mreturn = if self.matches(TokenKind::Arrow) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.matches(TokenKind::Semicolon);
            let span = mstart.merge(mname.span);
            methods.push(MethodSig {
                name: mname,
                generics: mgenerics,
                params: mparams,
                return_type: mreturn,
                span,
            });
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;
        Ok(TraitDecl {
            name,
            generics,
            bounds,
            methods,
            is_public,
            span: start.merge(end),
        })
    }

    fn parse_impl(&mut self) -> Result<ImplBlock, ParseError> {
        let start = self.expect(TokenKind::KwImpl, "`impl`")?.span;
        let generics = self.parse_generic_params()?;
        let first_type = self.parse_type()?;
        let (trait_type, target_type) = if self.matches(TokenKind::KwFor) {
            (Some(first_type), self.parse_type()?)
        } else {
            (None, first_type)
        };
        let where_clauses = self.parse_where_clauses()?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let method_public = self.matches(TokenKind::KwPub);
            methods.push(self.parse_function(method_public)?);
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;
        Ok(ImplBlock {
            generics,
            trait_type,
            target_type,
            where_clauses,
            methods,
            span: start.merge(end),
        })
    }

    fn parse_type_alias(&mut self) -> Result<TypeAlias, ParseError> {
        let start = self.expect(TokenKind::KwType, "`type`")?.span;
        let name = self.ident("type name")?;
        let generics = self.parse_generic_params()?;
        self.expect(TokenKind::Assign, "`=`")?;
        let ty = self.parse_type()?;
        let span = start.merge(ty.span());
        self.matches(TokenKind::Semicolon);
        Ok(TypeAlias {
            name,
            generics,
            ty,
            span,
        })
    }

    fn parse_newtype(&mut self) -> Result<NewType, ParseError> {
        let start = self.expect(TokenKind::KwNewtype, "`newtype`")?.span;
        let name = self.ident("type name")?;
        let generics = self.parse_generic_params()?;
        self.expect(TokenKind::Assign, "`=`")?;
        let ty = self.parse_type()?;
        let span = start.merge(ty.span());
        self.matches(TokenKind::Semicolon);
        Ok(NewType {
            name,
            generics,
            ty,
            span,
        })
    }

    fn parse_path_decl(
        &mut self,
        keyword: TokenKind,
    ) -> Result<(Vec<Ident>, Option<Ident>, bool, Span), ParseError> {
        let start = self.expect(keyword, "path keyword")?.span;
        let mut path = vec![self.ident("module path")?];
        let mut glob = false;
        while self.matches(TokenKind::PathSep) {
            if self.matches(TokenKind::Star) {
                glob = true;
                break;
            }
            path.push(self.ident("path segment")?);
        }
        let alias = if self.matches(TokenKind::KwAs) {
            Some(self.ident("alias")?)
        } else {
            None
        };
        let mut span = start.merge(path.last().expect("path is non-empty").span);
        if let Some(alias) = &alias {
            span = span.merge(alias.span);
        }
        self.matches(TokenKind::Semicolon);
        Ok((path, alias, glob, span))
    }

    fn parse_macro_def(&mut self) -> Result<MacroDefinition, ParseError> {
        let start = self.expect(TokenKind::KwMacro, "`macro`")?.span;
        let name = self.ident("macro name")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) && !self.at_end() {
            params.push(self.ident("macro parameter")?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        let rule = MacroRule {
            params,
            body: body.statements,
            span,
        };
        Ok(MacroDefinition {
            name,
            rules: vec![rule],
            span,
        })
    }

    // ------------------------------------------------------------------
    // Generics, where clauses, types
    // ------------------------------------------------------------------

    fn parse_generic_params(&mut self) -> Result<Vec<GenericParam>, ParseError> {
        if !self.matches(TokenKind::Lt) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        while !self.check(TokenKind::Gt) && !self.at_end() {
            let name = self.ident("generic parameter")?;
            let mut bounds = Vec::new();
            if self.matches(TokenKind::Colon) {
                loop {
                    bounds.push(self.parse_type()?);
                    if !self.matches(TokenKind::Plus) {
                        break;
                    }
                }
            }
            let span = name.span;
            params.push(GenericParam { name, bounds, span });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt, "`>`")?;
        Ok(params)
    }

    fn parse_where_clauses(&mut self) -> Result<Vec<WhereClause>, ParseError> {
        if !self.matches(TokenKind::KwWhere) {
            return Ok(Vec::new());
        }
        let mut clauses = Vec::new();
        loop {
            let target = self.parse_type()?;
            self.expect(TokenKind::Colon, "`:` in where clause")?;
            let mut bounds = Vec::new();
            loop {
                bounds.push(self.parse_type()?);
                if !self.matches(TokenKind::Plus) {
                    break;
                }
            }
            let span = target.span();
            clauses.push(WhereClause {
                target,
                bounds,
                span,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(clauses)
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Amp => {
                self.advance();
                let lifetime = if self.check(TokenKind::Char) {
                    // A lifetime lexes as a short char literal: `&'a T`.
                    let tok = self.advance();
                    Some(Ident::new(tok.literal, tok.span))
                } else {
                    None
                };
                let mutable = self.matches(TokenKind::KwMut);
                let inner = Box::new(self.parse_type()?);
                let span = token.span.merge(inner.span());
                Ok(Type::Reference(RefType {
                    lifetime,
                    mutable,
                    inner,
                    span,
                }))
            }
            TokenKind::Star => {
                self.advance();
                let mutable = self.matches(TokenKind::KwMut);
                let inner = Box::new(self.parse_type()?);
                let span = token.span.merge(inner.span());
                Ok(Type::Pointer(PtrType {
                    mutable,
                    inner,
                    span,
                }))
            }
            TokenKind::LBracket => {
                self.advance();
                let element = Box::new(self.parse_type()?);
                self.expect(TokenKind::Semicolon, "`;` in array type")?;
                let size_tok = self.expect(TokenKind::Integer, "array length")?;
                let size = size_tok.literal.parse::<u64>().map_err(|_| ParseError {
                    message: format!("invalid array length '{}'", size_tok.literal),
                    span: size_tok.span,
                    suggestion: None,
                })?;
                let end = self.expect(TokenKind::RBracket, "`]`")?.span;
                Ok(Type::Array(ArrayType {
                    element,
                    size,
                    span: token.span.merge(end),
                }))
            }
            TokenKind::KwFunc => {
                // `fn(T, U) -> R` function types.
                self.advance();
                self.expect(TokenKind::LParen, "`(`")?;
                let mut params = Vec::new();
                while !self.check(TokenKind::RParen) && !self.at_end() {
                    params.push(self.parse_type()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                let mut end = self.expect(TokenKind::RParen, "`)`")?.span;
                let ret = if self.matches(TokenKind::Arrow) {
                    let ty = self.parse_type()?;
                    end = ty.span();
                    Some(Box::new(ty))
                } else {
                    None
                };
                Ok(Type::Function(FnType {
                    params,
                    ret,
                    span: token.span.merge(end),
                }))
            }
            TokenKind::Identifier => {
                let name = self.ident("type name")?;
                let mut span = name.span;
                let mut generics = Vec::new();
                if self.matches(TokenKind::Lt) {
                    while !self.check(TokenKind::Gt) && !self.at_end() {
                        generics.push(self.parse_type()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    span = span.merge(self.close_generic_list()?);
                }
                Ok(Type::Named(NamedType {
                    name,
                    generics,
                    span,
                }))
            }
            _ => Err(self.error_here(format!(
                "expected type, found {}",
                token.kind.name()
            ))),
        }
    }

    /// Consume the `>` that closes a generic argument list, splitting a `>>`
    /// token in place when generics are nested (`Vec<Vec<T>>`).
    fn close_generic_list(&mut self) -> Result<Span, ParseError> {
        match self.peek().kind {
            TokenKind::Gt => Ok(self.advance().span),
            TokenKind::Shr => {
                let tok = self.tokens[self.pos].clone();
                let mut first = tok.span;
                first.end.offset = first.start.offset + 1;
                first.end.column = first.start.column + 1;
                let mut second = tok.span;
                second.start = first.end;
                self.tokens[self.pos] = Token::new(TokenKind::Gt, ">", second);
                Ok(first)
            }
            _ => Err(self.error_here(format!(
                "expected `>`, found {}",
                self.peek().kind.name()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.expect(TokenKind::LBrace, "`{`")?.span;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            if self.check(TokenKind::Semicolon) {
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_statement();
                }
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span;
        Ok(Block {
            statements,
            span: start.merge(end),
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::KwReturn => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let mut span = token.span;
                if let Some(v) = &value {
                    span = span.merge(v.span());
                }
                self.matches(TokenKind::Semicolon);
                Ok(Statement::Return(ReturnStmt { value, span }))
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                let span = token.span.merge(body.span);
                Ok(Statement::While(WhileStmt {
                    condition,
                    body,
                    span,
                }))
            }
            TokenKind::KwLoop => {
                // `loop { }` is an infinite while at this level.
                self.advance();
                let body = self.parse_block()?;
                let span = token.span.merge(body.span);
                Ok(Statement::While(WhileStmt {
                    condition: Expression::Literal(Literal {
                        value: LiteralValue::Bool(true),
                        span: token.span,
                    }),
                    body,
                    span,
                }))
            }
            TokenKind::KwFor => {
                self.advance();
                let binding = self.ident("loop variable")?;
                self.expect(TokenKind::KwIn, "`in`")?;
                let iterable = self.parse_expression()?;
                let body = self.parse_block()?;
                let span = token.span.merge(body.span);
                Ok(Statement::For(ForStmt {
                    binding,
                    iterable,
                    body,
                    span,
                }))
            }
            TokenKind::KwLet | TokenKind::KwVar | TokenKind::KwConst => {
                Ok(Statement::VariableDecl(self.parse_variable(false)?))
            }
            TokenKind::KwBreak => {
                self.advance();
                self.matches(TokenKind::Semicolon);
                Ok(Statement::Break(token.span))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.matches(TokenKind::Semicolon);
                Ok(Statement::Continue(token.span))
            }
            TokenKind::Identifier if token.literal == "throw" => {
                self.advance();
                let value = self.parse_expression()?;
                let span = token.span.merge(value.span());
                self.matches(TokenKind::Semicolon);
                Ok(Statement::Throw(ThrowStmt { value, span }))
            }
            TokenKind::Identifier
                if token.literal == "try" && self.peek_at(1).kind == TokenKind::LBrace =>
            {
                self.parse_try_catch()
            }
            TokenKind::Error => {
                let err = self.error_here(format!("lexical error: {}", token.literal));
                self.advance();
                Err(err)
            }
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span();
                self.matches(TokenKind::Semicolon);
                Ok(Statement::Expression(ExpressionStmt { expr, span }))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let start = self.expect(TokenKind::KwIf, "`if`")?.span;
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let mut span = start.merge(then_block.span);
        let else_branch = if self.matches(TokenKind::KwElse) {
            let branch = if self.check(TokenKind::KwIf) {
                self.parse_if()?
            } else {
                Statement::Block(self.parse_block()?)
            };
            span = span.merge(branch.span());
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Statement::If(IfStmt {
            condition,
            then_block,
            else_branch,
            span,
        }))
    }

    fn parse_try_catch(&mut self) -> Result<Statement, ParseError> {
        let start = self.advance().span; // `try`
        let try_block = self.parse_block()?;
        if !self.check_ident("catch") {
            return Err(self.error_with_hint(
                "expected `catch` after try block".to_string(),
                "try blocks need a catch handler: try { ... } catch (e) { ... }",
            ));
        }
        self.advance();
        let catch_binding = if self.matches(TokenKind::LParen) {
            let binding = self.ident("catch binding")?;
            self.expect(TokenKind::RParen, "`)`")?;
            Some(binding)
        } else {
            None
        };
        let catch_block = self.parse_block()?;
        let span = start.merge(catch_block.span);
        Ok(Statement::TryCatch(TryCatchStmt {
            try_block,
            catch_binding,
            catch_block,
            span,
        }))
    }

    // ------------------------------------------------------------------
    // Expressions (precedence climbing, lowest first)
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_logical_or()?;
        let op = match self.peek().kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            TokenKind::PercentAssign => AssignOp::Rem,
            TokenKind::AmpAssign => AssignOp::BitAnd,
            TokenKind::PipeAssign => AssignOp::BitOr,
            TokenKind::CaretAssign => AssignOp::BitXor,
            TokenKind::ShlAssign => AssignOp::Shl,
            TokenKind::ShrAssign => AssignOp::Shr,
            _ => return Ok(left),
        };
        self.advance();
        // Right-associative.
        let value = self.parse_assignment()?;
        let span = left.span().merge(value.span());
        Ok(Expression::Assign(AssignExpr {
            op,
            target: Box::new(left),
            value: Box::new(value),
            span,
        }))
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.check(TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_equality()?;
        while self.check(TokenKind::AmpAmp) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_bit_or()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_bit_or()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_bit_xor()?;
        while self.check(TokenKind::Pipe) {
            self.advance();
            let right = self.parse_bit_xor()?;
            left = binary(BinaryOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_bit_and()?;
        while self.check(TokenKind::Caret) {
            self.advance();
            let right = self.parse_bit_and()?;
            left = binary(BinaryOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_shift()?;
        while self.check(TokenKind::Amp) {
            self.advance();
            let right = self.parse_shift()?;
            left = binary(BinaryOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_unary()?;
        if self.check(TokenKind::Power) {
            self.advance();
            // Right-associative.
            let right = self.parse_power()?;
            return Ok(binary(BinaryOp::Pow, left, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Amp => Some(UnaryOp::Ref),
            TokenKind::Star => Some(UnaryOp::Deref),
            _ => None,
        };
        if let Some(mut op) = op {
            self.advance();
            if op == UnaryOp::Ref && self.matches(TokenKind::KwMut) {
                op = UnaryOp::RefMut;
            }
            let operand = self.parse_unary()?;
            let span = token.span.merge(operand.span());
            return Ok(Expression::Unary(UnaryExpr {
                op,
                operand: Box::new(operand),
                span,
            }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let member = self.ident("member name")?;
                    let span = expr.span().merge(member.span);
                    expr = Expression::Member(MemberExpr {
                        object: Box::new(expr),
                        member,
                        span,
                    });
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(TokenKind::RBracket, "`]`")?.span;
                    let span = expr.span().merge(end);
                    expr = Expression::Index(IndexExpr {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span,
                    });
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(TokenKind::RParen) && !self.at_end() {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::RParen, "`)`")?.span;
                    let span = expr.span().merge(end);
                    expr = Expression::Call(CallExpr {
                        callee: Box::new(expr),
                        args,
                        span,
                    });
                }
                TokenKind::Question => {
                    let end = self.advance().span;
                    let span = expr.span().merge(end);
                    expr = Expression::Try(TryExpr {
                        expr: Box::new(expr),
                        span,
                    });
                }
                TokenKind::KwAs => {
                    self.advance();
                    let ty = self.parse_type()?;
                    let span = expr.span().merge(ty.span());
                    expr = Expression::Cast(CastExpr {
                        expr: Box::new(expr),
                        ty,
                        span,
                    });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                let value = token.literal.parse::<i64>().map_err(|_| ParseError {
                    message: format!("integer literal '{}' out of range", token.literal),
                    span: token.span,
                    suggestion: None,
                })?;
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Integer(value),
                    span: token.span,
                }))
            }
            TokenKind::Float => {
                self.advance();
                let value = token.literal.parse::<f64>().map_err(|_| ParseError {
                    message: format!("float literal '{}' out of range", token.literal),
                    span: token.span,
                    suggestion: None,
                })?;
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Float(value),
                    span: token.span,
                }))
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Str(token.literal),
                    span: token.span,
                }))
            }
            TokenKind::Char => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Char(token.literal),
                    span: token.span,
                }))
            }
            TokenKind::Bool => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Bool(token.literal == "true"),
                    span: token.span,
                }))
            }
            TokenKind::Identifier => {
                let name = self.ident("identifier")?;
                // `name!` or `name!(args)` is a macro invocation.
                if self.check(TokenKind::MacroInvoke) {
                    let mut span = name.span.merge(self.advance().span);
                    let mut args = Vec::new();
                    if self.matches(TokenKind::LParen) {
                        while !self.check(TokenKind::RParen) && !self.at_end() {
                            args.push(self.parse_expression()?);
                            if !self.matches(TokenKind::Comma) {
                                break;
                            }
                        }
                        span = span.merge(self.expect(TokenKind::RParen, "`)`")?.span);
                    }
                    return Ok(Expression::MacroInvocation(MacroInvocationExpr {
                        name,
                        args,
                        span,
                    }));
                }
                // `Name { field: ... }` is a struct literal; the lookahead
                // for `ident :` keeps block-starting contexts unambiguous.
                if self.check(TokenKind::LBrace)
                    && self.peek_at(1).kind == TokenKind::Identifier
                    && self.peek_at(2).kind == TokenKind::Colon
                {
                    self.advance(); // `{`
                    let mut fields = Vec::new();
                    while !self.check(TokenKind::RBrace) && !self.at_end() {
                        let fname = self.ident("field name")?;
                        self.expect(TokenKind::Colon, "`:`")?;
                        let value = self.parse_expression()?;
                        fields.push((fname, value));
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::RBrace, "`}`")?.span;
                    let span = name.span.merge(end);
                    return Ok(Expression::StructLiteral(StructLiteralExpr {
                        name,
                        fields,
                        span,
                    }));
                }
                Ok(Expression::Identifier(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) && !self.at_end() {
                    elements.push(self.parse_expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(TokenKind::RBracket, "`]`")?.span;
                Ok(Expression::Array(ArrayExpr {
                    elements,
                    span: token.span.merge(end),
                }))
            }
            TokenKind::Error => {
                self.advance();
                Err(ParseError {
                    message: format!("lexical error: {}", token.literal),
                    span: token.span,
                    suggestion: None,
                })
            }
            _ => Err(self.error_here(format!(
                "expected expression, found {}",
                token.kind.name()
            ))),
        }
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    let span = left.span().merge(right.span());
    Expression::Binary(BinaryExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    })
}

/// Parse source text in one call.
pub fn parse_source(source: &str) -> (Program, Vec<ParseError>) {
    Parser::from_source(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        program
    }

    #[test]
    fn test_parse_hello_world() {
        let program = parse_ok(r#"func main() { print("Hello, Orizon!"); }"#);
        assert_eq!(program.declarations.len(), 1);
        let Declaration::Function(func) = &program.declarations[0] else {
            panic!("expected function");
        };
        assert_eq!(func.name.name, "main");
        assert_eq!(func.body.statements.len(), 1);
        let Statement::Expression(stmt) = &func.body.statements[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expr else {
            panic!("expected call");
        };
        assert!(matches!(&*call.callee, Expression::Identifier(i) if i.name == "print"));
        assert_eq!(call.args.len(), 1);
    }

    #[test]
    fn test_parse_variable_declaration() {
        let program = parse_ok("let x = 42;");
        assert_eq!(program.declarations.len(), 1);
        let Declaration::Variable(var) = &program.declarations[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.name.name, "x");
        assert_eq!(var.kind, BindingKind::Let);
        assert!(matches!(
            var.initializer,
            Some(Expression::Literal(Literal {
                value: LiteralValue::Integer(42),
                ..
            }))
        ));
    }

    #[test]
    fn test_lexical_error_yields_empty_program() {
        let (program, errors) = parse_source("\"unterminated string literal");
        assert!(program.declarations.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated string literal"));
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("let y = 1 + 2 * 3 ** 2 == 19 && true;");
        let Declaration::Variable(var) = &program.declarations[0] else {
            panic!("expected variable");
        };
        let rendered = var.initializer.as_ref().unwrap().to_string();
        assert_eq!(rendered, "(((1 + (2 * (3 ** 2))) == 19) && true)");
    }

    #[test]
    fn test_unary_and_postfix() {
        let program = parse_ok("let z = -a.b[0](c)?;");
        let Declaration::Variable(var) = &program.declarations[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.initializer.as_ref().unwrap().to_string(), "(-a.b[0](c)?)");
    }

    #[test]
    fn test_cast_expression() {
        let program = parse_ok("let v = x as i64;");
        let Declaration::Variable(var) = &program.declarations[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.initializer.as_ref().unwrap().to_string(), "(x as i64)");
    }

    #[test]
    fn test_struct_enum_trait_impl() {
        let source = r#"
struct Point<T> { x: T, y: T }
enum Shape { Circle(f64), Rect { w: f64, h: f64 }, Unit }
trait Area: Clone { func area(self: Point<f64>) -> f64; }
impl Area for Point<f64> { func area(self: Point<f64>) -> f64 { return 0.0; } }
impl Point<f64> { func origin() -> Point<f64> { return Point { x: 0.0, y: 0.0 }; } }
"#;
        let program = parse_ok(source);
        assert_eq!(program.declarations.len(), 5);
        let Declaration::Struct(s) = &program.declarations[0] else {
            panic!("expected struct");
        };
        assert_eq!(s.fields.len(), 2);
        let Declaration::Enum(e) = &program.declarations[1] else {
            panic!("expected enum");
        };
        assert_eq!(e.variants.len(), 3);
        assert!(matches!(e.variants[2].fields, VariantFields::Unit));
        let Declaration::Impl(trait_impl) = &program.declarations[3] else {
            panic!("expected impl");
        };
        assert!(trait_impl.trait_type.is_some());
        let Declaration::Impl(inherent) = &program.declarations[4] else {
            panic!("expected impl");
        };
        assert!(inherent.trait_type.is_none());
    }

    #[test]
    fn test_nested_generics_shift_split() {
        let program = parse_ok("type Matrix = Vec<Vec<f64>>;");
        let Declaration::TypeAlias(alias) = &program.declarations[0] else {
            panic!("expected type alias");
        };
        assert_eq!(alias.ty.to_string(), "Vec<Vec<f64>>");
    }

    #[test]
    fn test_types() {
        let program = parse_ok(
            "type A = &mut i64; type B = *u8; type C = [i64; 4]; type D = fn(i64) -> bool;",
        );
        let types: Vec<String> = program
            .declarations
            .iter()
            .map(|d| match d {
                Declaration::TypeAlias(a) => a.ty.to_string(),
                _ => panic!("expected alias"),
            })
            .collect();
        assert_eq!(types, vec!["&mut i64", "*u8", "[i64; 4]", "fn(i64) -> bool"]);
    }

    #[test]
    fn test_import_export() {
        let program = parse_ok("import std::io as io;\nexport math::vec::*;");
        let Declaration::Import(import) = &program.declarations[0] else {
            panic!("expected import");
        };
        assert_eq!(import.path.len(), 2);
        assert_eq!(import.alias.as_ref().unwrap().name, "io");
        assert!(!import.glob);
        let Declaration::Export(export) = &program.declarations[1] else {
            panic!("expected export");
        };
        assert!(export.glob);
    }

    #[test]
    fn test_macro_definition_and_invocation() {
        let program = parse_ok("macro m() { x; }\nfunc main() { m!(); }");
        let Declaration::MacroDefinition(def) = &program.declarations[0] else {
            panic!("expected macro definition");
        };
        assert_eq!(def.name.name, "m");
        assert_eq!(def.rules.len(), 1);
        let Declaration::Function(func) = &program.declarations[1] else {
            panic!("expected function");
        };
        let Statement::Expression(stmt) = &func.body.statements[0] else {
            panic!("expected expression statement");
        };
        assert!(matches!(&stmt.expr, Expression::MacroInvocation(m) if m.name.name == "m"));
    }

    #[test]
    fn test_control_flow_statements() {
        let source = r#"
func f(n: i64) -> i64 {
    var total = 0;
    for i in n {
        if i % 2 == 0 { total += i; } else { continue; }
    }
    while total > 100 { total -= 1; }
    loop { break; }
    try { risky(); } catch (e) { throw e; }
    return total;
}
"#;
        let program = parse_ok(source);
        let Declaration::Function(func) = &program.declarations[0] else {
            panic!("expected function");
        };
        assert_eq!(func.body.statements.len(), 6);
        assert!(matches!(func.body.statements[4], Statement::TryCatch(_)));
    }

    #[test]
    fn test_error_recovery_keeps_later_declarations() {
        let (program, errors) = parse_source("func broken( { }\nlet ok = 1;");
        assert!(!errors.is_empty());
        assert!(
            program
                .declarations
                .iter()
                .any(|d| d.name() == Some("ok")),
            "later declaration should survive: {:?}",
            program.declarations
        );
    }

    #[test]
    fn test_errors_inside_block_recover_locally() {
        let (program, errors) = parse_source("func f() { let x = ; let y = 2; }");
        assert_eq!(errors.len(), 1);
        let Declaration::Function(func) = &program.declarations[0] else {
            panic!("expected function");
        };
        // The second statement survived local recovery.
        assert!(func.body.statements.iter().any(
            |s| matches!(s, Statement::VariableDecl(v) if v.name.name == "y")
        ));
    }

    #[test]
    fn test_pretty_print_fixpoint() {
        let source = r#"
import std::io;
pub struct Pair<T: Clone> { a: T, b: T }
enum E { A, B(i64) }
trait T { func m(x: i64) -> i64; }
impl T for Pair<i64> { func m(x: i64) -> i64 { return x; } }
type Alias = Vec<Vec<i64>>;
newtype Meters = f64;
macro twice(e) { e; e; }
pub func main() -> i64 {
    let x: i64 = 1 + 2 * 3;
    if x > 5 { print("big"); } else { print("small"); }
    for i in x { twice!(i); }
    return x;
}
"#;
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{:?}", errors);
        let printed = program.to_string();
        let (reparsed, reparse_errors) = parse_source(&printed);
        assert!(reparse_errors.is_empty(), "{:?}\n---\n{}", reparse_errors, printed);
        let reprinted = reparsed.to_string();
        assert_eq!(printed, reprinted);
    }

    #[test]
    fn test_empty_input() {
        let (program, errors) = parse_source("");
        assert!(errors.is_empty());
        assert!(program.declarations.is_empty());
    }

    #[test]
    fn test_declarations_in_source_order() {
        let program = parse_ok("let a = 1; let b = 2; func c() { }");
        let names: Vec<_> = program
            .declarations
            .iter()
            .filter_map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
