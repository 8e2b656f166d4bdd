//! Source-to-artifact pipeline
//!
//! One entry point strings the stages together: lex+parse, optional macro
//! expansion, AST bridge, HIR build, MIR lowering with the optimization
//! pipeline, and LIR selection. Each stage's errors abort the file and are
//! reported together; nothing panics on malformed input.

use crate::bridge::to_core;
use crate::config::CompilerConfig;
use crate::hir::{HirError, build_module};
use crate::lir::{LirProgram, select_program};
use crate::macros;
use crate::mir::{LoweringError, MirProgram, lower_module, optimize, verify_program};
use crate::parser::{ParseError, Parser};
use crate::recovery::LexicalError;

#[derive(Debug)]
pub enum CompileError {
    Parse {
        lexical: Vec<LexicalError>,
        parse: Vec<ParseError>,
    },
    Hir(Vec<HirError>),
    Lowering(Vec<LoweringError>),
    Internal(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse { lexical, parse } => write!(
                f,
                "{} lexical and {} parse errors",
                lexical.len(),
                parse.len()
            ),
            CompileError::Hir(errors) => write!(f, "{} HIR errors", errors.len()),
            CompileError::Lowering(errors) => write!(f, "{} lowering errors", errors.len()),
            CompileError::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Everything the driver snapshots for one file.
#[derive(Debug)]
pub struct Artifacts {
    pub mir: MirProgram,
    pub lir: LirProgram,
}

pub fn compile_source(
    source: &str,
    module_name: &str,
    expand_macros: bool,
) -> Result<Artifacts, CompileError> {
    compile_source_with_config(source, module_name, expand_macros, &CompilerConfig::default())
}

pub fn compile_source_with_config(
    source: &str,
    module_name: &str,
    expand_macros: bool,
    config: &CompilerConfig,
) -> Result<Artifacts, CompileError> {
    let mut lexer = crate::lexer::Lexer::with_config(source, config.recovery.clone());
    let tokens = lexer.tokenize();
    let lexical = lexer.take_errors();
    let (mut program, parse_errors) = Parser::new(tokens).parse();
    if !lexical.is_empty() || !parse_errors.is_empty() {
        return Err(CompileError::Parse {
            lexical,
            parse: parse_errors,
        });
    }

    if expand_macros {
        // Warnings (duplicate definitions, depth limits) are not fatal.
        let _warnings = macros::expand(&mut program);
    }

    let core = to_core(program);
    let (hir, hir_errors) = build_module(core, module_name);
    if !hir_errors.is_empty() {
        return Err(CompileError::Hir(hir_errors));
    }

    let (mut mir, lowering_errors) = lower_module(&hir.modules[0]);
    if !lowering_errors.is_empty() {
        return Err(CompileError::Lowering(lowering_errors));
    }
    optimize(&mut mir);
    verify_program(&mir).map_err(CompileError::Internal)?;

    let lir = select_program(&mir);
    Ok(Artifacts { mir, lir })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world_end_to_end() {
        let artifacts =
            compile_source(r#"func main() { print("Hello, Orizon!"); }"#, "hello", false)
                .unwrap();
        let mir = artifacts.mir.to_text();
        assert!(mir.contains("call print, \"Hello, Orizon!\""), "{}", mir);
        assert!(mir.contains("ret void"), "{}", mir);
        let lir = artifacts.lir.to_text();
        assert!(lir.contains("call print"), "{}", lir);
    }

    #[test]
    fn test_top_level_let_end_to_end() {
        let artifacts = compile_source("let x = 42;", "vars", false).unwrap();
        let mir = artifacts.mir.to_text();
        assert!(mir.contains("%x = const 42"), "{}", mir);
    }

    #[test]
    fn test_lexical_error_fails_file() {
        let err = compile_source("\"unterminated string literal", "bad", false).unwrap_err();
        let CompileError::Parse { lexical, parse } = err else {
            panic!("expected parse stage failure");
        };
        assert_eq!(lexical.len(), 1);
        assert_eq!(parse.len(), 1);
    }

    #[test]
    fn test_macro_expansion_scenario() {
        // With expansion the body lowers; without it HIR reports the
        // unresolved invocation.
        let source = "macro m() { x(); }\nfunc main() { m!(); }";
        let expanded = compile_source(source, "m", true).unwrap();
        assert!(expanded.mir.to_text().contains("call x"));

        let err = compile_source(source, "m", false).unwrap_err();
        assert!(matches!(err, CompileError::Hir(_)));
    }

    #[test]
    fn test_empty_source() {
        let artifacts = compile_source("", "empty", false).unwrap();
        assert!(artifacts.mir.functions.is_empty());
        assert_eq!(artifacts.mir.to_text(), "");
    }

    #[test]
    fn test_deterministic_pipeline() {
        let source = r#"
func fib(n: i64) -> i64 {
    if n < 2 { return n; }
    return fib(n - 1) + fib(n - 2);
}
func main() { print(fib(10)); }
"#;
        let a = compile_source(source, "fib", false).unwrap();
        let b = compile_source(source, "fib", false).unwrap();
        assert_eq!(a.mir.to_text(), b.mir.to_text());
        assert_eq!(a.lir.to_text(), b.lir.to_text());
    }
}
