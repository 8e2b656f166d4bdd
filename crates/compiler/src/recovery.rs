//! Lexical error classification and recovery
//!
//! The lexer never fails: every anomaly is turned into a structured
//! [`LexicalError`] plus an error token, and lexing continues. This module
//! owns the error taxonomy, the synchronization-point registry used by panic
//! mode, per-category suggestions, and the frequency map that deduplicates
//! repeated reports at the same location.

use orizon_core::span::{Position, Span};
use orizon_core::token::TokenKind;
use serde::Deserialize;
use std::collections::HashMap;

/// Hard cap on characters panic mode may skip before giving up.
pub const PANIC_MODE_LIMIT: usize = 1000;

/// Category of a lexical error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Unicode,
    UnterminatedString,
    InvalidCharacter,
    MalformedNumber,
    InvalidEscape,
    CommentError,
    EncodingError,
}

impl ErrorCategory {
    /// Stable short code used in diagnostics, one per category.
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Unicode => "L0001",
            ErrorCategory::UnterminatedString => "L0002",
            ErrorCategory::InvalidCharacter => "L0003",
            ErrorCategory::MalformedNumber => "L0004",
            ErrorCategory::InvalidEscape => "L0005",
            ErrorCategory::CommentError => "L0006",
            ErrorCategory::EncodingError => "L0007",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCategory::Unicode => "unicode",
            ErrorCategory::UnterminatedString => "unterminated_string",
            ErrorCategory::InvalidCharacter => "invalid_character",
            ErrorCategory::MalformedNumber => "malformed_number",
            ErrorCategory::InvalidEscape => "invalid_escape",
            ErrorCategory::CommentError => "comment_error",
            ErrorCategory::EncodingError => "encoding_error",
        }
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl Severity {
    /// Convert to LSP DiagnosticSeverity number
    pub fn to_lsp_severity(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Hint => 4,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Hint => f.write_str("hint"),
        }
    }
}

/// How the lexer recovered after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    /// Skip forward to the next synchronization point.
    PanicMode,
    /// Drop a single character and retry.
    DeleteChar,
    /// Skip while the offending pattern continues.
    SkipSequence,
    /// Reserved; falls back to panic mode.
    Insert,
    /// Reserved; falls back to panic mode.
    Replace,
    /// Reserved; falls back to panic mode.
    Contextual,
}

impl RecoveryKind {
    pub fn name(self) -> &'static str {
        match self {
            RecoveryKind::PanicMode => "panic-mode",
            RecoveryKind::DeleteChar => "delete-char",
            RecoveryKind::SkipSequence => "skip-sequence",
            RecoveryKind::Insert => "insert",
            RecoveryKind::Replace => "replace",
            RecoveryKind::Contextual => "contextual",
        }
    }
}

/// A structured lexical error.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalError {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub position: Position,
    pub span: Span,
    pub message: String,
    /// The characters surrounding the error site.
    pub context: String,
    pub suggestions: Vec<String>,
    pub recovery_kind: RecoveryKind,
    pub chars_skipped: usize,
}

impl std::fmt::Display for LexicalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}: {} [{}]",
            self.position.line, self.position.column, self.severity, self.message, self.code
        )
    }
}

impl std::error::Error for LexicalError {}

/// Bounds on error reporting, loadable from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Stop recording errors past this count (lexing itself continues).
    pub max_errors: usize,
    /// Attach per-category suggestions to reported errors.
    pub enable_suggestions: bool,
    /// Character cap for panic-mode scanning.
    pub panic_limit: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            max_errors: 100,
            enable_suggestions: true,
            panic_limit: PANIC_MODE_LIMIT,
        }
    }
}

impl RecoveryConfig {
    /// Parse a recovery configuration from TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse recovery config: {}", e))
    }
}

/// Characters panic mode treats as synchronization anchors.
const SYNC_CHARS: &[char] = &[';', '{', '}', '(', ')', '[', ']', '\n'];

/// Characters the classifier recognizes as invalid inside identifiers.
const INVALID_IDENT_CHARS: &[char] = &['-', '@', '#', '$', '%', '^', '&', '*'];

/// Typographic quotes users paste from documents.
const TYPOGRAPHIC_QUOTES: &[char] = &['\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Error collector and recovery selector for one lexer instance.
///
/// Owns the frequency map that deduplicates reports keyed by
/// `(category, line, column)` and the registry of sync token kinds.
#[derive(Debug)]
pub struct ErrorRecovery {
    config: RecoveryConfig,
    errors: Vec<LexicalError>,
    /// (category, line, column) -> occurrence count.
    frequency: HashMap<(ErrorCategory, u32, u32), usize>,
    sync_kinds: Vec<TokenKind>,
}

impl ErrorRecovery {
    pub fn new(config: RecoveryConfig) -> Self {
        ErrorRecovery {
            config,
            errors: Vec::new(),
            frequency: HashMap::new(),
            sync_kinds: default_sync_kinds(),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Token kinds usable as resynchronization anchors.
    pub fn sync_kinds(&self) -> &[TokenKind] {
        &self.sync_kinds
    }

    pub fn is_sync_kind(&self, kind: TokenKind) -> bool {
        self.sync_kinds.contains(&kind) || kind.starts_declaration()
    }

    /// Select a recovery strategy from the characters around the error site.
    ///
    /// `context` holds the previous and next few characters; `offending` is
    /// the character that triggered the error.
    pub fn select_recovery(&self, context: &str, offending: char) -> RecoveryKind {
        if TYPOGRAPHIC_QUOTES.contains(&offending) {
            return RecoveryKind::DeleteChar;
        }
        // A run of the same offending character: skip the whole sequence.
        let mut after = context.chars().skip_while(|&c| c != offending);
        after.next();
        if after.next() == Some(offending) {
            return RecoveryKind::SkipSequence;
        }
        if INVALID_IDENT_CHARS.contains(&offending) {
            return RecoveryKind::DeleteChar;
        }
        RecoveryKind::PanicMode
    }

    /// Whether `c` resynchronizes panic mode.
    pub fn is_sync_char(&self, c: char) -> bool {
        SYNC_CHARS.contains(&c)
    }

    /// Record an error, deduplicating by (category, line, column) and
    /// honoring `max_errors`. Returns false when the report was dropped.
    pub fn report(&mut self, mut error: LexicalError) -> bool {
        let key = (
            error.category,
            error.position.line,
            error.position.column,
        );
        let count = self.frequency.entry(key).or_insert(0);
        *count += 1;
        if *count > 1 {
            return false;
        }
        if self.errors.len() >= self.config.max_errors {
            return false;
        }
        if self.config.enable_suggestions && error.suggestions.is_empty() {
            error.suggestions = suggestions_for(error.category, &error.context);
        } else if !self.config.enable_suggestions {
            error.suggestions.clear();
        }
        self.errors.push(error);
        true
    }

    pub fn errors(&self) -> &[LexicalError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LexicalError> {
        self.frequency.clear();
        std::mem::take(&mut self.errors)
    }
}

fn default_sync_kinds() -> Vec<TokenKind> {
    vec![
        TokenKind::Semicolon,
        TokenKind::Newline,
        TokenKind::LBrace,
        TokenKind::RBrace,
        TokenKind::LParen,
        TokenKind::RParen,
        TokenKind::LBracket,
        TokenKind::RBracket,
    ]
}

/// Per-category suggestion text.
fn suggestions_for(category: ErrorCategory, context: &str) -> Vec<String> {
    match category {
        ErrorCategory::UnterminatedString => {
            let mut out = vec!["add a closing '\"' before the end of the line or file".to_string()];
            if context.chars().any(|c| TYPOGRAPHIC_QUOTES.contains(&c)) {
                out.push("replace typographic quotes with straight '\"' quotes".to_string());
            }
            out
        }
        ErrorCategory::InvalidEscape => vec![
            "supported escapes: \\\" \\\\ \\n \\r \\t".to_string(),
            "double the backslash to write a literal '\\'".to_string(),
        ],
        ErrorCategory::InvalidCharacter => {
            vec!["remove the character or separate it with whitespace".to_string()]
        }
        ErrorCategory::MalformedNumber => vec![
            "separate the number and the identifier with whitespace".to_string(),
        ],
        ErrorCategory::CommentError => {
            vec!["close the block comment with '*/'".to_string()]
        }
        ErrorCategory::Unicode | ErrorCategory::EncodingError => {
            vec!["re-save the file as UTF-8".to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err_at(category: ErrorCategory, line: u32, column: u32) -> LexicalError {
        let pos = Position::new(line, column, 0);
        LexicalError {
            code: category.code(),
            category,
            severity: Severity::Error,
            position: pos,
            span: Span::point(pos),
            message: "test".to_string(),
            context: String::new(),
            suggestions: Vec::new(),
            recovery_kind: RecoveryKind::PanicMode,
            chars_skipped: 0,
        }
    }

    #[test]
    fn test_frequency_dedup() {
        let mut rec = ErrorRecovery::new(RecoveryConfig::default());
        assert!(rec.report(err_at(ErrorCategory::InvalidCharacter, 1, 5)));
        assert!(!rec.report(err_at(ErrorCategory::InvalidCharacter, 1, 5)));
        // Different column is a distinct site.
        assert!(rec.report(err_at(ErrorCategory::InvalidCharacter, 1, 6)));
        // Different category at the same site is distinct too.
        assert!(rec.report(err_at(ErrorCategory::MalformedNumber, 1, 5)));
        assert_eq!(rec.errors().len(), 3);
    }

    #[test]
    fn test_max_errors_bound() {
        let config = RecoveryConfig {
            max_errors: 2,
            ..RecoveryConfig::default()
        };
        let mut rec = ErrorRecovery::new(config);
        assert!(rec.report(err_at(ErrorCategory::InvalidCharacter, 1, 1)));
        assert!(rec.report(err_at(ErrorCategory::InvalidCharacter, 1, 2)));
        assert!(!rec.report(err_at(ErrorCategory::InvalidCharacter, 1, 3)));
        assert_eq!(rec.errors().len(), 2);
    }

    #[test]
    fn test_suggestions_attached() {
        let mut rec = ErrorRecovery::new(RecoveryConfig::default());
        rec.report(err_at(ErrorCategory::UnterminatedString, 1, 1));
        assert!(!rec.errors()[0].suggestions.is_empty());
    }

    #[test]
    fn test_suggestions_disabled() {
        let config = RecoveryConfig {
            enable_suggestions: false,
            ..RecoveryConfig::default()
        };
        let mut rec = ErrorRecovery::new(config);
        rec.report(err_at(ErrorCategory::UnterminatedString, 1, 1));
        assert!(rec.errors()[0].suggestions.is_empty());
    }

    #[test]
    fn test_recovery_selection() {
        let rec = ErrorRecovery::new(RecoveryConfig::default());
        assert_eq!(
            rec.select_recovery("x\u{201C}y", '\u{201C}'),
            RecoveryKind::DeleteChar
        );
        assert_eq!(rec.select_recovery("a@@b", '@'), RecoveryKind::SkipSequence);
        assert_eq!(rec.select_recovery("a\u{0}b", '\u{0}'), RecoveryKind::PanicMode);
    }

    #[test]
    fn test_config_from_toml() {
        let config = RecoveryConfig::from_toml(
            "max_errors = 7\nenable_suggestions = false\npanic_limit = 500\n",
        )
        .unwrap();
        assert_eq!(config.max_errors, 7);
        assert!(!config.enable_suggestions);
        assert_eq!(config.panic_limit, 500);
        // Missing fields fall back to defaults.
        let partial = RecoveryConfig::from_toml("max_errors = 3\n").unwrap();
        assert_eq!(partial.max_errors, 3);
        assert!(partial.enable_suggestions);
    }

    #[test]
    fn test_sync_kinds() {
        let rec = ErrorRecovery::new(RecoveryConfig::default());
        assert!(rec.is_sync_kind(TokenKind::Semicolon));
        assert!(rec.is_sync_kind(TokenKind::KwFunc));
        assert!(!rec.is_sync_kind(TokenKind::Identifier));
        assert!(rec.is_sync_char(';'));
        assert!(!rec.is_sync_char('x'));
    }
}
