//! Orizon Compiler Library
//!
//! Front-end and lowering pipeline for the Orizon systems language:
//! lexer, incremental lexer, recursive-descent parser, macro engine, the
//! AST bridge, HIR construction, SSA MIR with its optimization pipeline,
//! LIR selection, and the Windows-x64 diagnostic emitter. The bootstrap
//! driver walks `.oriz` inputs, writes deterministic text artifacts, and
//! verifies them against golden files.
//!
//! # Embedding the pipeline
//!
//! ```rust,ignore
//! use orizonc::{CompilerConfig, compile_source};
//!
//! let artifacts = compile_source(source, "my_module", /*expand_macros*/ true)?;
//! println!("{}", artifacts.mir.to_text());
//! ```

pub mod ast;
pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod core_ast;
pub mod hir;
pub mod incremental;
pub mod lexer;
pub mod lir;
pub mod macros;
pub mod mir;
pub mod parser;
pub mod pipeline;
pub mod recovery;
pub mod x64;

pub use ast::Program;
pub use bootstrap::{BootstrapDriver, BootstrapSummary, FileStatus};
pub use bridge::{from_core, to_core};
pub use config::CompilerConfig;
pub use hir::{HirProgram, build_module};
pub use incremental::{Change, IncrementalLexer};
pub use lexer::Lexer;
pub use lir::select_program;
pub use mir::{lower_module, optimize, verify_program};
pub use parser::{ParseError, Parser, parse_source};
pub use pipeline::{Artifacts, CompileError, compile_source, compile_source_with_config};
pub use recovery::{ErrorCategory, LexicalError, RecoveryConfig, Severity};
pub use x64::emit_program;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_incremental_matches_batch_pipeline_input() {
        // Cache transparency across the public API surface.
        let source = "func main() { let x = 1 + 2; }";
        let inc = IncrementalLexer::new();
        let out = inc.lex(Path::new("m.oriz"), source, &[]);
        let mut lexer = Lexer::new(source);
        assert_eq!(out.tokens, lexer.tokenize());
    }

    #[test]
    fn test_public_pipeline_round_trip() {
        let (program, errors) = parse_source("let a = 1;\nfunc b() { }");
        assert!(errors.is_empty());
        let restored = from_core(to_core(program.clone()));
        assert_eq!(program, restored);
    }

    #[test]
    fn test_compile_and_emit() {
        let artifacts = compile_source("func main() { }", "m", false).unwrap();
        let asm = emit_program(&artifacts.lir, "m.oriz");
        assert!(asm.contains("; source: m.oriz"));
    }
}
