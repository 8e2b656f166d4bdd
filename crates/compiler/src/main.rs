//! Orizon Compiler CLI
//!
//! Command-line interface for the bootstrap snapshot driver and lexer
//! tooling.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use orizonc::bootstrap::BootstrapDriver;
use orizonc::config::CompilerConfig;
use orizonc::lexer::Lexer;
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "orizonc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Orizon compiler - snapshot pipeline and lexer tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the snapshot pipeline and verify against golden files
    Bootstrap {
        /// Input .oriz files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory for snapshot artifacts
        #[arg(long, default_value = "artifacts/selfhost")]
        out_dir: PathBuf,

        /// Emit MIR text (passing any --emit-* flag selects exactly that set)
        #[arg(long)]
        emit_mir: bool,

        /// Emit LIR text
        #[arg(long)]
        emit_lir: bool,

        /// Emit x64 text
        #[arg(long)]
        emit_x64: bool,

        /// Directory of golden files to compare against
        #[arg(long)]
        golden_dir: Option<PathBuf>,

        /// Create or overwrite goldens instead of failing
        #[arg(long)]
        update_golden: bool,

        /// Expand macros before bridging
        #[arg(long)]
        expand_macros: bool,
    },

    /// Dump the token stream of a source file
    Tokens {
        /// Input .oriz source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orizonc=warn".parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bootstrap {
            inputs,
            out_dir,
            emit_mir,
            emit_lir,
            emit_x64,
            golden_dir,
            update_golden,
            expand_macros,
        } => {
            // No explicit emit flag selects all three outputs.
            let (mir, lir, x64) = if emit_mir || emit_lir || emit_x64 {
                (emit_mir, emit_lir, emit_x64)
            } else {
                (true, true, true)
            };
            let mut config = CompilerConfig::new()
                .with_out_dir(out_dir)
                .with_update_golden(update_golden)
                .with_expand_macros(expand_macros)
                .with_emits(mir, lir, x64);
            if let Some(golden_dir) = golden_dir {
                config = config.with_golden_dir(golden_dir);
            }

            let summary = BootstrapDriver::new(config).run(&inputs);
            print!("{}", summary.render());
            if summary.failed() > 0 {
                process::exit(1);
            }
        }

        Commands::Tokens { input } => {
            let source = match std::fs::read_to_string(&input) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("error: failed to read {}: {}", input.display(), e);
                    process::exit(1);
                }
            };
            let mut lexer = Lexer::new(&source);
            for token in lexer.tokenize() {
                println!(
                    "{}:{}-{}:{} {}",
                    token.span.start.line,
                    token.span.start.column,
                    token.span.end.line,
                    token.span.end.column,
                    token
                );
            }
            let errors = lexer.take_errors();
            for error in &errors {
                eprintln!("{}: {}", input.display(), error);
            }
            if !errors.is_empty() {
                process::exit(1);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }
}
