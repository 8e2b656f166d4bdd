//! Tokenizer for Orizon source text
//!
//! Byte-indexed, Unicode-aware scanning. The lexer never fails: anomalies
//! become `Error` tokens and/or recorded [`LexicalError`]s and scanning
//! continues at the next safe character (see [`crate::recovery`]).
//!
//! Whitespace (space, tab, CR) is skipped; `\n` is emitted as its own token
//! so the parser and editor tooling can see line structure. Comments are
//! emitted as single tokens including their delimiters.

use crate::recovery::{
    ErrorCategory, ErrorRecovery, LexicalError, RecoveryConfig, RecoveryKind, Severity,
};
use orizon_core::span::{Position, Span};
use orizon_core::token::{Token, TokenKind, keyword_kind};

/// Characters that may follow `!` when it marks a macro invocation.
const MACRO_MARKER_FOLLOW: &[char] = &[
    '(', ')', '[', ']', '{', '}', ';', ',', '.', ':', '?', '@', '#', '$', '\\', '|',
];

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

pub struct Lexer<'src> {
    source: &'src str,
    /// Current byte offset.
    pos: usize,
    line: u32,
    column: u32,
    recovery: ErrorRecovery,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_config(source, RecoveryConfig::default())
    }

    pub fn with_config(source: &'src str, config: RecoveryConfig) -> Self {
        Lexer {
            source,
            pos: 0,
            line: 1,
            column: 1,
            recovery: ErrorRecovery::new(config),
        }
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[LexicalError] {
        self.recovery.errors()
    }

    /// Drain recorded errors, resetting the dedup state.
    pub fn take_errors(&mut self) -> Vec<LexicalError> {
        self.recovery.take_errors()
    }

    /// Lex the whole source, including the trailing EOF token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn token(&self, kind: TokenKind, literal: impl Into<String>, start: Position) -> Token {
        Token::new(kind, literal, Span::new(start, self.position()))
    }

    /// The previous and next few characters around `at`, for error context.
    fn context_around(&self, at: usize) -> String {
        let before: String = self.source[..at].chars().rev().take(5).collect();
        let mut ctx: String = before.chars().rev().collect();
        ctx.extend(self.source[at..].chars().take(6));
        ctx
    }

    fn report(
        &mut self,
        category: ErrorCategory,
        message: impl Into<String>,
        start: Position,
        recovery_kind: RecoveryKind,
        chars_skipped: usize,
    ) {
        let error = LexicalError {
            code: category.code(),
            category,
            severity: Severity::Error,
            position: start,
            span: Span::new(start, self.position()),
            message: message.into(),
            context: self.context_around(start.offset),
            suggestions: Vec::new(),
            recovery_kind,
            chars_skipped,
        };
        self.recovery.report(error);
    }

    /// Produce the next token. Returns `Eof` at (and after) end of input.
    pub fn next_token(&mut self) -> Token {
        loop {
            let start = self.position();
            let Some(c) = self.peek() else {
                return self.token(TokenKind::Eof, "", start);
            };
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    return self.token(TokenKind::Newline, "\n", start);
                }
                '/' if self.peek_second() == Some('/') => {
                    return self.line_comment(start);
                }
                '/' if self.peek_second() == Some('*') => {
                    return self.block_comment(start);
                }
                '"' => return self.string_literal(start),
                '\'' => return self.char_literal(start),
                c if c.is_ascii_digit() => return self.number(start),
                c if is_ident_start(c) => return self.identifier(start),
                _ => {
                    if let Some(token) = self.operator_or_punct(start) {
                        return token;
                    }
                    // Nothing matched: recover, then loop for the next token.
                    if let Some(token) = self.recover_invalid_char(start) {
                        return token;
                    }
                }
            }
        }
    }

    fn line_comment(&mut self, start: Position) -> Token {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let literal = &self.source[start.offset..self.pos];
        self.token(TokenKind::Comment, literal, start)
    }

    fn block_comment(&mut self, start: Position) -> Token {
        self.bump(); // '/'
        self.bump(); // '*'
        loop {
            match self.peek() {
                None => {
                    self.report(
                        ErrorCategory::CommentError,
                        "unterminated block comment",
                        start,
                        RecoveryKind::PanicMode,
                        0,
                    );
                    return self.token(TokenKind::Error, "unterminated block comment", start);
                }
                Some('*') if self.peek_second() == Some('/') => {
                    self.bump();
                    self.bump();
                    let literal = &self.source[start.offset..self.pos];
                    return self.token(TokenKind::Comment, literal, start);
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// String literal. The escape character is consumed but not interpreted:
    /// the character after a backslash is kept verbatim.
    fn string_literal(&mut self, start: Position) -> Token {
        self.bump(); // opening '"'
        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    self.report(
                        ErrorCategory::UnterminatedString,
                        "unterminated string literal",
                        start,
                        RecoveryKind::PanicMode,
                        0,
                    );
                    return self.token(TokenKind::Error, "unterminated string literal", start);
                }
                Some('"') => {
                    self.bump();
                    return self.token(TokenKind::Str, content, start);
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        content.push(escaped);
                    }
                }
                Some(c) => {
                    self.bump();
                    content.push(c);
                }
            }
        }
    }

    fn char_literal(&mut self, start: Position) -> Token {
        self.bump(); // opening '\''
        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    self.report(
                        ErrorCategory::UnterminatedString,
                        "unterminated character literal",
                        start,
                        RecoveryKind::PanicMode,
                        0,
                    );
                    return self.token(TokenKind::Error, "unterminated character literal", start);
                }
                Some('\'') => {
                    self.bump();
                    return self.token(TokenKind::Char, content, start);
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        content.push(escaped);
                    }
                }
                Some(c) => {
                    self.bump();
                    content.push(c);
                }
            }
        }
    }

    fn number(&mut self, start: Position) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let mut kind = TokenKind::Integer;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump(); // '.'
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            kind = TokenKind::Float;
        }

        // A second fractional part or a trailing identifier character makes
        // the whole run malformed.
        let second_dot =
            self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit());
        let ident_tail = self.peek().is_some_and(is_ident_start);
        if second_dot || ident_tail {
            loop {
                match self.peek() {
                    Some(c) if is_ident_continue(c) => {
                        self.bump();
                    }
                    Some('.') if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                        self.bump();
                    }
                    _ => break,
                }
            }
            let literal = self.source[start.offset..self.pos].to_string();
            self.report(
                ErrorCategory::MalformedNumber,
                format!("malformed number literal '{}'", literal),
                start,
                RecoveryKind::SkipSequence,
                0,
            );
            return self.token(TokenKind::Error, literal, start);
        }

        let literal = &self.source[start.offset..self.pos];
        self.token(kind, literal, start)
    }

    fn identifier(&mut self, start: Position) -> Token {
        let mut invalid_char = None;
        loop {
            match self.peek() {
                Some(c) if is_ident_continue(c) => {
                    self.bump();
                }
                // '@', '#', '$' embedded between identifier characters make
                // the whole run malformed; the run keeps consuming.
                Some(c @ ('@' | '#' | '$'))
                    if self.peek_second().is_some_and(is_ident_continue) =>
                {
                    invalid_char.get_or_insert(c);
                    self.bump();
                }
                _ => break,
            }
        }

        if let Some(c) = invalid_char {
            self.report(
                ErrorCategory::InvalidCharacter,
                format!("invalid character '{}' in identifier", c),
                start,
                RecoveryKind::SkipSequence,
                0,
            );
            return self.token(TokenKind::Error, "invalid character in identifier", start);
        }

        let literal = &self.source[start.offset..self.pos];
        match keyword_kind(literal) {
            Some(kind) => self.token(kind, literal, start),
            None => self.token(TokenKind::Identifier, literal, start),
        }
    }

    /// Longest-first operator and punctuation matching.
    fn operator_or_punct(&mut self, start: Position) -> Option<Token> {
        let c = self.peek()?;
        let second = self.peek_second();

        // Three-character operators first.
        if (c == '<' || c == '>')
            && second == Some(c)
            && self.source[self.pos..].chars().nth(2) == Some('=')
        {
            self.bump();
            self.bump();
            self.bump();
            let (kind, text) = if c == '<' {
                (TokenKind::ShlAssign, "<<=")
            } else {
                (TokenKind::ShrAssign, ">>=")
            };
            return Some(self.token(kind, text, start));
        }

        let two = |kind| Some((kind, 2));
        let one = |kind| Some((kind, 1));
        let matched: Option<(TokenKind, usize)> = match (c, second) {
            ('=', Some('=')) => two(TokenKind::EqEq),
            ('=', Some('>')) => two(TokenKind::FatArrow),
            ('=', _) => one(TokenKind::Assign),
            ('!', Some('=')) => two(TokenKind::NotEq),
            ('!', next) => return Some(self.bang(start, next)),
            ('<', Some('<')) => two(TokenKind::Shl),
            ('<', Some('=')) => two(TokenKind::LtEq),
            ('<', _) => one(TokenKind::Lt),
            ('>', Some('>')) => two(TokenKind::Shr),
            ('>', Some('=')) => two(TokenKind::GtEq),
            ('>', _) => one(TokenKind::Gt),
            ('&', Some('&')) => two(TokenKind::AmpAmp),
            ('&', Some('=')) => two(TokenKind::AmpAssign),
            ('&', _) => one(TokenKind::Amp),
            ('|', Some('|')) => two(TokenKind::PipePipe),
            ('|', Some('=')) => two(TokenKind::PipeAssign),
            ('|', _) => one(TokenKind::Pipe),
            ('+', Some('=')) => two(TokenKind::PlusAssign),
            ('+', _) => one(TokenKind::Plus),
            ('-', Some('=')) => two(TokenKind::MinusAssign),
            ('-', Some('>')) => two(TokenKind::Arrow),
            ('-', _) => one(TokenKind::Minus),
            ('*', Some('*')) => two(TokenKind::Power),
            ('*', Some('=')) => two(TokenKind::StarAssign),
            ('*', _) => one(TokenKind::Star),
            ('/', Some('=')) => two(TokenKind::SlashAssign),
            ('/', _) => one(TokenKind::Slash),
            ('%', Some('=')) => two(TokenKind::PercentAssign),
            ('%', _) => one(TokenKind::Percent),
            ('^', Some('=')) => two(TokenKind::CaretAssign),
            ('^', _) => one(TokenKind::Caret),
            (':', Some(':')) => two(TokenKind::PathSep),
            (':', _) => one(TokenKind::Colon),
            ('~', _) => one(TokenKind::Tilde),
            ('(', _) => one(TokenKind::LParen),
            (')', _) => one(TokenKind::RParen),
            ('{', _) => one(TokenKind::LBrace),
            ('}', _) => one(TokenKind::RBrace),
            ('[', _) => one(TokenKind::LBracket),
            (']', _) => one(TokenKind::RBracket),
            (';', _) => one(TokenKind::Semicolon),
            (',', _) => one(TokenKind::Comma),
            ('.', _) => one(TokenKind::Dot),
            ('?', _) => one(TokenKind::Question),
            ('@', _) => one(TokenKind::At),
            ('#', _) => one(TokenKind::Hash),
            ('$', _) => one(TokenKind::Dollar),
            ('\\', _) => one(TokenKind::Backslash),
            ('`', _) => one(TokenKind::Backquote),
            _ => None,
        };

        let (kind, len) = matched?;
        for _ in 0..len {
            self.bump();
        }
        let text = &self.source[start.offset..self.pos];
        Some(self.token(kind, text, start))
    }

    /// `!` is a macro-invocation marker when followed by end of line, end of
    /// file, or punctuation; otherwise it is logical NOT.
    fn bang(&mut self, start: Position, next: Option<char>) -> Token {
        self.bump();
        let is_marker = match next {
            None | Some('\n') => true,
            // Another unary operator keeps `!` a logical NOT (`!!x`, `!-x`).
            Some('-' | '!' | '~' | '&' | '*') => false,
            Some(c) if MACRO_MARKER_FOLLOW.contains(&c) => true,
            _ => false,
        };
        if is_marker {
            self.token(TokenKind::MacroInvoke, "!", start)
        } else {
            self.token(TokenKind::Not, "!", start)
        }
    }

    /// Recovery for a character no rule matched. Returns a token only when
    /// panic mode hits its scan cap; otherwise the caller retries.
    fn recover_invalid_char(&mut self, start: Position) -> Option<Token> {
        let c = self.peek()?;
        let category = if c.is_ascii() {
            ErrorCategory::InvalidCharacter
        } else {
            ErrorCategory::Unicode
        };
        let context = self.context_around(self.pos);
        let kind = self.recovery.select_recovery(&context, c);
        let panic_limit = self.recovery.config().panic_limit;

        let mut skipped = 0usize;
        match kind {
            RecoveryKind::DeleteChar => {
                self.bump();
                skipped = 1;
            }
            RecoveryKind::SkipSequence => {
                while self.peek() == Some(c) {
                    self.bump();
                    skipped += 1;
                }
            }
            RecoveryKind::PanicMode
            | RecoveryKind::Insert
            | RecoveryKind::Replace
            | RecoveryKind::Contextual => {
                while let Some(next) = self.peek() {
                    if self.recovery.is_sync_char(next) {
                        break;
                    }
                    self.bump();
                    skipped += 1;
                    if skipped >= panic_limit {
                        self.report(
                            category,
                            format!("unexpected character '{}'", c),
                            start,
                            RecoveryKind::PanicMode,
                            skipped,
                        );
                        return Some(self.token(
                            TokenKind::Error,
                            "error recovery limit reached",
                            start,
                        ));
                    }
                }
            }
        }

        self.report(
            category,
            format!("unexpected character '{}'", c),
            start,
            kind,
            skipped,
        );
        None
    }
}

/// Lex `source` to completion, returning tokens (EOF included) and errors.
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexicalError>) {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize();
    let errors = lexer.take_errors();
    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_hello_world_tokens() {
        let (tokens, errors) = lex(r#"func main() { print("Hello, Orizon!"); }"#);
        assert!(errors.is_empty());
        let expected = [
            (TokenKind::KwFunc, "func"),
            (TokenKind::Identifier, "main"),
            (TokenKind::LParen, "("),
            (TokenKind::RParen, ")"),
            (TokenKind::LBrace, "{"),
            (TokenKind::Identifier, "print"),
            (TokenKind::LParen, "("),
            (TokenKind::Str, "Hello, Orizon!"),
            (TokenKind::RParen, ")"),
            (TokenKind::Semicolon, ";"),
            (TokenKind::RBrace, "}"),
            (TokenKind::Eof, ""),
        ];
        assert_eq!(tokens.len(), expected.len());
        for (tok, (kind, lit)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(tok.kind, *kind, "token {:?}", tok);
            assert_eq!(tok.literal, *lit);
        }
    }

    #[test]
    fn test_let_statement_tokens() {
        let (tokens, errors) = lex("let x = 42;");
        assert!(errors.is_empty());
        let got: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            got,
            vec![
                TokenKind::KwLet,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Integer,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[3].literal, "42");
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = lex("\"unterminated string literal");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].literal, "unterminated string literal");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::UnterminatedString);
        assert_eq!(errors[0].position.line, 1);
        assert_eq!(errors[0].position.column, 1);
    }

    #[test]
    fn test_malformed_number() {
        let (tokens, errors) = lex("123abc");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].literal, "123abc");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::MalformedNumber);
    }

    #[test]
    fn test_float_and_second_dot() {
        let (tokens, errors) = lex("3.25");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].literal, "3.25");

        let (tokens, errors) = lex("1.2.3");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].literal, "1.2.3");
        assert_eq!(errors[0].category, ErrorCategory::MalformedNumber);

        // A dot not followed by a digit is member access, not a float.
        let got = kinds("1.x");
        assert_eq!(
            got,
            vec![
                TokenKind::Integer,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes_consumed_not_interpreted() {
        let (tokens, errors) = lex(r#""say \"hi\"""#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].literal, "say \"hi\"");
    }

    #[test]
    fn test_char_literal() {
        let (tokens, errors) = lex(r"'a' '\n'");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Char);
        assert_eq!(tokens[0].literal, "a");
        assert_eq!(tokens[1].kind, TokenKind::Char);
        assert_eq!(tokens[1].literal, "n");
    }

    #[test]
    fn test_comments() {
        let (tokens, errors) = lex("// line\n/* block */");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].literal, "// line");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].literal, "/* block */");
    }

    #[test]
    fn test_unterminated_block_comment() {
        let (tokens, errors) = lex("/* open");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(errors[0].category, ErrorCategory::CommentError);
    }

    #[test]
    fn test_operators_longest_first() {
        let got = kinds("<<= >>= == != <= >= && || :: -> => ** += << >>");
        assert_eq!(
            got,
            vec![
                TokenKind::ShlAssign,
                TokenKind::ShrAssign,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::PathSep,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Power,
                TokenKind::PlusAssign,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bang_disambiguation() {
        // Followed by an identifier: logical NOT.
        assert_eq!(
            kinds("!ready"),
            vec![TokenKind::Not, TokenKind::Identifier, TokenKind::Eof]
        );
        // Followed by punctuation: macro marker.
        assert_eq!(
            kinds("m!()"),
            vec![
                TokenKind::Identifier,
                TokenKind::MacroInvoke,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
        // At end of file: macro marker.
        assert_eq!(
            kinds("m!"),
            vec![TokenKind::Identifier, TokenKind::MacroInvoke, TokenKind::Eof]
        );
        // `a!b`: NOT between identifiers.
        assert_eq!(
            kinds("a!b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Not,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        // Double negation stays NOT.
        assert_eq!(
            kinds("!!x"),
            vec![
                TokenKind::Not,
                TokenKind::Not,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_invalid_identifier_character() {
        let (tokens, errors) = lex("foo@bar");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].literal, "invalid character in identifier");
        // One error token covering the whole malformed identifier.
        assert_eq!(tokens[0].span.start.offset, 0);
        assert_eq!(tokens[0].span.end.offset, 7);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::InvalidCharacter);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_standalone_punct_at_hash_dollar() {
        assert_eq!(
            kinds("@ # $"),
            vec![TokenKind::At, TokenKind::Hash, TokenKind::Dollar, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unicode_identifier() {
        let (tokens, errors) = lex("λx");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].literal, "λx");
        // Span end is a byte offset past the two-byte lambda.
        assert_eq!(tokens[0].span.end.offset, 3);
        assert_eq!(tokens[0].span.end.column, 3);
    }

    #[test]
    fn test_keywords_and_bool() {
        assert_eq!(
            kinds("fn func true false newtype"),
            vec![
                TokenKind::KwFunc,
                TokenKind::KwFunc,
                TokenKind::Bool,
                TokenKind::Bool,
                TokenKind::KwNewtype,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let (tokens, errors) = lex("");
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_panic_mode_limit() {
        // A control character starts panic mode; with no sync char in the
        // next `panic_limit` characters, exactly one limit token is emitted.
        let mut source = String::from("\u{1}");
        source.push_str(&"x".repeat(1200));
        let (tokens, errors) = lex(&source);
        let limit_tokens: Vec<_> = tokens
            .iter()
            .filter(|t| t.literal == "error recovery limit reached")
            .collect();
        assert_eq!(limit_tokens.len(), 1);
        assert!(!errors.is_empty());
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_lex_restart_idempotence() {
        let source = "func add(a: i64, b: i64) -> i64 { return a + b; }\nlet x = 1.5;";
        let (first, _) = lex(source);
        let (second, _) = lex(source);
        assert_eq!(first, second);
    }

    #[test]
    fn test_span_containment() {
        let source = "let x = 42 + foo(1.5, \"s\");";
        let (tokens, _) = lex(source);
        for tok in &tokens {
            match tok.kind {
                TokenKind::Identifier
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::KwLet
                | TokenKind::Plus
                | TokenKind::Assign
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Semicolon => {
                    assert_eq!(
                        &source[tok.span.start.offset..tok.span.end.offset],
                        tok.literal,
                        "span mismatch for {:?}",
                        tok
                    );
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_newline_positions() {
        let (tokens, _) = lex("a\nb");
        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[2].span.start.line, 2);
        assert_eq!(tokens[2].span.start.column, 1);
        assert_eq!(tokens[2].span.start.offset, 2);
    }
}
