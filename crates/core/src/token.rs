//! Token taxonomy for the Orizon lexer
//!
//! The kind set is closed: every token the lexer can emit is listed here,
//! and downstream passes dispatch on it with exhaustive `match`.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Eof,
    Error,
    Newline,
    Whitespace,
    Comment,

    Identifier,
    Integer,
    Float,
    Str,
    Char,
    Bool,

    // Keywords
    KwFunc,
    KwLet,
    KwVar,
    KwConst,
    KwStruct,
    KwEnum,
    KwTrait,
    KwImpl,
    KwIf,
    KwElse,
    KwFor,
    KwWhile,
    KwLoop,
    KwMatch,
    KwReturn,
    KwBreak,
    KwContinue,
    KwAsync,
    KwAwait,
    KwActor,
    KwSpawn,
    KwImport,
    KwExport,
    KwModule,
    KwPub,
    KwMut,
    KwAs,
    KwIn,
    KwWhere,
    KwUnsafe,
    KwMacro,
    KwNewtype,
    KwType,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AmpAmp,
    PipePipe,
    Not,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    PathSep,
    Arrow,
    FatArrow,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,
    At,
    Hash,
    Dollar,
    Backslash,

    // Macro-specific
    MacroInvoke,
    Backquote,
    MacroPattern,
    MacroRepeat,
    MacroGroup,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwFunc
                | TokenKind::KwLet
                | TokenKind::KwVar
                | TokenKind::KwConst
                | TokenKind::KwStruct
                | TokenKind::KwEnum
                | TokenKind::KwTrait
                | TokenKind::KwImpl
                | TokenKind::KwIf
                | TokenKind::KwElse
                | TokenKind::KwFor
                | TokenKind::KwWhile
                | TokenKind::KwLoop
                | TokenKind::KwMatch
                | TokenKind::KwReturn
                | TokenKind::KwBreak
                | TokenKind::KwContinue
                | TokenKind::KwAsync
                | TokenKind::KwAwait
                | TokenKind::KwActor
                | TokenKind::KwSpawn
                | TokenKind::KwImport
                | TokenKind::KwExport
                | TokenKind::KwModule
                | TokenKind::KwPub
                | TokenKind::KwMut
                | TokenKind::KwAs
                | TokenKind::KwIn
                | TokenKind::KwWhere
                | TokenKind::KwUnsafe
                | TokenKind::KwMacro
                | TokenKind::KwNewtype
                | TokenKind::KwType
        )
    }

    /// Keywords that can start a top-level declaration. Used by parser and
    /// error recovery as synchronization anchors.
    pub fn starts_declaration(self) -> bool {
        matches!(
            self,
            TokenKind::KwFunc
                | TokenKind::KwLet
                | TokenKind::KwVar
                | TokenKind::KwConst
                | TokenKind::KwStruct
                | TokenKind::KwEnum
                | TokenKind::KwTrait
                | TokenKind::KwImpl
                | TokenKind::KwImport
                | TokenKind::KwExport
                | TokenKind::KwMacro
                | TokenKind::KwNewtype
                | TokenKind::KwType
                | TokenKind::KwPub
        )
    }

    /// Stable display name used in diagnostics and token dumps.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "EOF",
            TokenKind::Error => "ERROR",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Whitespace => "WHITESPACE",
            TokenKind::Comment => "COMMENT",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Integer => "INTEGER",
            TokenKind::Float => "FLOAT",
            TokenKind::Str => "STRING",
            TokenKind::Char => "CHAR",
            TokenKind::Bool => "BOOL",
            TokenKind::KwFunc => "FUNC",
            TokenKind::KwLet => "LET",
            TokenKind::KwVar => "VAR",
            TokenKind::KwConst => "CONST",
            TokenKind::KwStruct => "STRUCT",
            TokenKind::KwEnum => "ENUM",
            TokenKind::KwTrait => "TRAIT",
            TokenKind::KwImpl => "IMPL",
            TokenKind::KwIf => "IF",
            TokenKind::KwElse => "ELSE",
            TokenKind::KwFor => "FOR",
            TokenKind::KwWhile => "WHILE",
            TokenKind::KwLoop => "LOOP",
            TokenKind::KwMatch => "MATCH",
            TokenKind::KwReturn => "RETURN",
            TokenKind::KwBreak => "BREAK",
            TokenKind::KwContinue => "CONTINUE",
            TokenKind::KwAsync => "ASYNC",
            TokenKind::KwAwait => "AWAIT",
            TokenKind::KwActor => "ACTOR",
            TokenKind::KwSpawn => "SPAWN",
            TokenKind::KwImport => "IMPORT",
            TokenKind::KwExport => "EXPORT",
            TokenKind::KwModule => "MODULE",
            TokenKind::KwPub => "PUB",
            TokenKind::KwMut => "MUT",
            TokenKind::KwAs => "AS",
            TokenKind::KwIn => "IN",
            TokenKind::KwWhere => "WHERE",
            TokenKind::KwUnsafe => "UNSAFE",
            TokenKind::KwMacro => "MACRO",
            TokenKind::KwNewtype => "NEWTYPE",
            TokenKind::KwType => "TYPE",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "STAR",
            TokenKind::Slash => "SLASH",
            TokenKind::Percent => "PERCENT",
            TokenKind::Power => "POWER",
            TokenKind::Assign => "ASSIGN",
            TokenKind::PlusAssign => "PLUS_ASSIGN",
            TokenKind::MinusAssign => "MINUS_ASSIGN",
            TokenKind::StarAssign => "STAR_ASSIGN",
            TokenKind::SlashAssign => "SLASH_ASSIGN",
            TokenKind::PercentAssign => "PERCENT_ASSIGN",
            TokenKind::AmpAssign => "AMP_ASSIGN",
            TokenKind::PipeAssign => "PIPE_ASSIGN",
            TokenKind::CaretAssign => "CARET_ASSIGN",
            TokenKind::ShlAssign => "SHL_ASSIGN",
            TokenKind::ShrAssign => "SHR_ASSIGN",
            TokenKind::EqEq => "EQ",
            TokenKind::NotEq => "NOT_EQ",
            TokenKind::Lt => "LT",
            TokenKind::Gt => "GT",
            TokenKind::LtEq => "LT_EQ",
            TokenKind::GtEq => "GT_EQ",
            TokenKind::AmpAmp => "AND_AND",
            TokenKind::PipePipe => "OR_OR",
            TokenKind::Not => "NOT",
            TokenKind::Amp => "AMP",
            TokenKind::Pipe => "PIPE",
            TokenKind::Caret => "CARET",
            TokenKind::Tilde => "TILDE",
            TokenKind::Shl => "SHL",
            TokenKind::Shr => "SHR",
            TokenKind::PathSep => "PATH_SEP",
            TokenKind::Arrow => "ARROW",
            TokenKind::FatArrow => "FAT_ARROW",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Colon => "COLON",
            TokenKind::Question => "QUESTION",
            TokenKind::At => "AT",
            TokenKind::Hash => "HASH",
            TokenKind::Dollar => "DOLLAR",
            TokenKind::Backslash => "BACKSLASH",
            TokenKind::MacroInvoke => "MACRO_INVOKE",
            TokenKind::Backquote => "BACKQUOTE",
            TokenKind::MacroPattern => "MACRO_PATTERN",
            TokenKind::MacroRepeat => "MACRO_REPEAT",
            TokenKind::MacroGroup => "MACRO_GROUP",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Keyword lookup. `func` and `fn` are aliases for the same kind.
pub fn keyword_kind(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "func" | "fn" => TokenKind::KwFunc,
        "let" => TokenKind::KwLet,
        "var" => TokenKind::KwVar,
        "const" => TokenKind::KwConst,
        "struct" => TokenKind::KwStruct,
        "enum" => TokenKind::KwEnum,
        "trait" => TokenKind::KwTrait,
        "impl" => TokenKind::KwImpl,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "for" => TokenKind::KwFor,
        "while" => TokenKind::KwWhile,
        "loop" => TokenKind::KwLoop,
        "match" => TokenKind::KwMatch,
        "return" => TokenKind::KwReturn,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "async" => TokenKind::KwAsync,
        "await" => TokenKind::KwAwait,
        "actor" => TokenKind::KwActor,
        "spawn" => TokenKind::KwSpawn,
        "import" => TokenKind::KwImport,
        "export" => TokenKind::KwExport,
        "module" => TokenKind::KwModule,
        "pub" => TokenKind::KwPub,
        "mut" => TokenKind::KwMut,
        "as" => TokenKind::KwAs,
        "in" => TokenKind::KwIn,
        "where" => TokenKind::KwWhere,
        "unsafe" => TokenKind::KwUnsafe,
        "macro" => TokenKind::KwMacro,
        "newtype" => TokenKind::KwNewtype,
        "type" => TokenKind::KwType,
        "true" | "false" => TokenKind::Bool,
        _ => return None,
    };
    Some(kind)
}

/// A lexed token with its source span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            literal: literal.into(),
            span,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.literal == *other
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.literal.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}({})", self.kind, self.literal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword_kind("func"), Some(TokenKind::KwFunc));
        assert_eq!(keyword_kind("fn"), Some(TokenKind::KwFunc));
        assert_eq!(keyword_kind("newtype"), Some(TokenKind::KwNewtype));
        assert_eq!(keyword_kind("true"), Some(TokenKind::Bool));
        assert_eq!(keyword_kind("funcs"), None);
        assert_eq!(keyword_kind(""), None);
    }

    #[test]
    fn test_declaration_starts() {
        assert!(TokenKind::KwFunc.starts_declaration());
        assert!(TokenKind::KwImport.starts_declaration());
        assert!(!TokenKind::KwIf.starts_declaration());
        assert!(!TokenKind::Identifier.starts_declaration());
    }

    #[test]
    fn test_token_literal_eq() {
        use crate::span::{Position, Span};
        let tok = Token::new(
            TokenKind::Identifier,
            "main",
            Span::point(Position::start()),
        );
        assert!(tok == "main");
        assert_eq!(tok.to_string(), "IDENTIFIER(main)");
    }
}
