//! Orizon core source-text primitives
//!
//! Shared between the compiler pipeline and editor tooling: byte-accurate
//! source positions and spans, the line-indexed source map, and the closed
//! token taxonomy the lexer emits.

pub mod span;
pub mod token;

pub use span::{Position, SourceMap, Span};
pub use token::{Token, TokenKind, keyword_kind};
