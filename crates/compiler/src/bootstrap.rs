//! Bootstrap snapshot driver
//!
//! Walks the input paths for `.oriz` sources, runs each file through the
//! full pipeline, writes deterministic MIR/LIR/x64 text artifacts, and
//! verifies them byte-for-byte against golden files when a golden directory
//! is configured. Files are processed sequentially so output order follows
//! input enumeration order.
//!
//! Snapshot names are collision-free: the path relative to the base
//! directory with separators replaced by `.` and the `.oriz` extension
//! stripped, so `examples/hello.oriz` and `bootstrap_samples/hello.oriz`
//! never clash.

use crate::config::CompilerConfig;
use crate::pipeline::{CompileError, compile_source_with_config};
use orizon_core::span::SourceMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Failed,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Diagnostics and golden-comparison messages, in emission order.
    pub messages: Vec<String>,
}

#[derive(Debug, Default)]
pub struct BootstrapSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl BootstrapSummary {
    pub fn passed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == FileStatus::Ok)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// Per-file OK/FAIL lines plus the final count line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let status = match outcome.status {
                FileStatus::Ok => "OK",
                FileStatus::Failed => "FAIL",
            };
            out.push_str(&format!("{} {}\n", status, outcome.path.display()));
            for message in &outcome.messages {
                out.push_str(&format!("  {}\n", message));
            }
        }
        out.push_str(&format!("{} passed, {} failed\n", self.passed(), self.failed()));
        out
    }
}

pub struct BootstrapDriver {
    config: CompilerConfig,
}

impl BootstrapDriver {
    pub fn new(config: CompilerConfig) -> Self {
        BootstrapDriver { config }
    }

    /// Run the snapshot pipeline over every `.oriz` file reachable from
    /// `inputs`.
    pub fn run(&self, inputs: &[PathBuf]) -> BootstrapSummary {
        let files = self.collect_inputs(inputs);
        let mut summary = BootstrapSummary::default();
        for file in files {
            info!(file = %file.display(), "processing");
            summary.outcomes.push(self.process_file(&file));
        }
        summary
    }

    /// Files in input order; directories contribute their `.oriz` files
    /// recursively, sorted.
    fn collect_inputs(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                let mut batch = Vec::new();
                collect_oriz_files(input, &mut batch);
                batch.sort();
                files.extend(batch);
            } else {
                files.push(input.clone());
            }
        }
        files
    }

    fn process_file(&self, path: &Path) -> FileOutcome {
        let mut messages = Vec::new();

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                messages.push(format!("error: failed to read {}: {}", path.display(), e));
                return FileOutcome {
                    path: path.to_path_buf(),
                    status: FileStatus::Failed,
                    messages,
                };
            }
        };

        let module_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();

        let artifacts = match compile_source_with_config(
            &source,
            &module_name,
            self.config.expand_macros,
            &self.config,
        ) {
            Ok(artifacts) => artifacts,
            Err(error) => {
                messages.extend(render_compile_error(path, &source, &error));
                return FileOutcome {
                    path: path.to_path_buf(),
                    status: FileStatus::Failed,
                    messages,
                };
            }
        };

        let base = self.flat_base(path);
        let source_name = self.display_name(path);
        let mut failed = false;

        let mut emits: Vec<(&str, String)> = Vec::new();
        if self.config.emit_mir {
            emits.push(("mir", artifacts.mir.to_text()));
        }
        if self.config.emit_lir {
            emits.push(("lir", artifacts.lir.to_text()));
        }
        if self.config.emit_x64 {
            emits.push(("x64", crate::x64::emit_program(&artifacts.lir, &source_name)));
        }

        for (ext, text) in emits {
            let file_name = format!("{}.{}", base, ext);
            let out_path = self.config.out_dir.join(&file_name);
            if let Err(e) = fs::create_dir_all(&self.config.out_dir) {
                messages.push(format!("error: failed to create output directory: {}", e));
                failed = true;
                break;
            }
            if let Err(e) = fs::write(&out_path, &text) {
                messages.push(format!("error: failed to write {}: {}", out_path.display(), e));
                failed = true;
                continue;
            }
            debug!(artifact = %out_path.display(), bytes = text.len(), "wrote snapshot");

            if let Some(golden_dir) = &self.config.golden_dir {
                let golden_path = golden_dir.join(&file_name);
                match fs::read(&golden_path) {
                    Ok(golden) => {
                        if golden != text.as_bytes() {
                            if self.config.update_golden {
                                if let Err(e) = fs::write(&golden_path, &text) {
                                    messages.push(format!(
                                        "error: failed to update golden {}: {}",
                                        golden_path.display(),
                                        e
                                    ));
                                    failed = true;
                                } else {
                                    messages
                                        .push(format!("updated golden {}", golden_path.display()));
                                }
                            } else {
                                messages
                                    .push(format!("golden mismatch: {}", golden_path.display()));
                                failed = true;
                            }
                        }
                    }
                    Err(_) => {
                        if self.config.update_golden {
                            if let Err(e) = fs::create_dir_all(golden_dir)
                                .and_then(|_| fs::write(&golden_path, &text))
                            {
                                messages.push(format!(
                                    "error: failed to create golden {}: {}",
                                    golden_path.display(),
                                    e
                                ));
                                failed = true;
                            } else {
                                messages.push(format!("created golden {}", golden_path.display()));
                            }
                        } else {
                            messages.push(format!("missing golden: {}", golden_path.display()));
                            failed = true;
                        }
                    }
                }
            }
        }

        FileOutcome {
            path: path.to_path_buf(),
            status: if failed { FileStatus::Failed } else { FileStatus::Ok },
            messages,
        }
    }

    /// Flat snapshot base: relative path, separators to `.`, extension
    /// stripped.
    fn flat_base(&self, path: &Path) -> String {
        let rel = self.relative(path);
        let mut parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .filter(|c| c != ".")
            .collect();
        if let Some(last) = parts.last_mut() {
            if let Some(stripped) = last.strip_suffix(".oriz") {
                *last = stripped.to_string();
            }
        }
        parts.join(".")
    }

    fn display_name(&self, path: &Path) -> String {
        self.relative(path).display().to_string()
    }

    fn relative(&self, path: &Path) -> PathBuf {
        let base = match &self.config.base_dir {
            Some(base) => Some(base.clone()),
            None => std::env::current_dir().ok(),
        };
        match base.and_then(|b| path.strip_prefix(&b).ok().map(Path::to_path_buf)) {
            Some(rel) => rel,
            None => path.to_path_buf(),
        }
    }
}

fn collect_oriz_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_oriz_files(&path, files);
            } else if path.extension().and_then(|e| e.to_str()) == Some("oriz") {
                files.push(path);
            }
        }
    }
}

/// Render a compile error as `<path>:<line>:<col>: <severity>: <message>`
/// lines with a caret pointer and numbered suggestions.
fn render_compile_error(path: &Path, source: &str, error: &CompileError) -> Vec<String> {
    let map = SourceMap::new(source);
    let mut out = Vec::new();
    match error {
        CompileError::Parse { lexical, parse } => {
            for err in lexical {
                out.extend(render_diagnostic(
                    path,
                    source,
                    &map,
                    err.position.line,
                    err.position.column,
                    "error",
                    &err.message,
                    &err.suggestions,
                ));
            }
            for err in parse {
                let suggestions: Vec<String> = err.suggestion.iter().cloned().collect();
                out.extend(render_diagnostic(
                    path,
                    source,
                    &map,
                    err.span.start.line,
                    err.span.start.column,
                    "error",
                    &err.message,
                    &suggestions,
                ));
            }
        }
        CompileError::Hir(errors) => {
            for err in errors {
                out.extend(render_diagnostic(
                    path,
                    source,
                    &map,
                    err.span.start.line,
                    err.span.start.column,
                    "error",
                    &err.message,
                    &[],
                ));
            }
        }
        CompileError::Lowering(errors) => {
            for err in errors {
                out.extend(render_diagnostic(
                    path,
                    source,
                    &map,
                    err.span.start.line,
                    err.span.start.column,
                    "error",
                    &err.message,
                    &[],
                ));
            }
        }
        CompileError::Internal(message) => {
            out.push(format!("{}: error: {}", path.display(), message));
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn render_diagnostic(
    path: &Path,
    source: &str,
    map: &SourceMap,
    line: u32,
    column: u32,
    severity: &str,
    message: &str,
    suggestions: &[String],
) -> Vec<String> {
    let mut out = vec![format!(
        "{}:{}:{}: {}: {}",
        path.display(),
        line,
        column,
        severity,
        message
    )];
    if let Some((start, end)) = map.line_range(line) {
        let text = &source[start..end];
        out.push(text.to_string());
        let caret_pad = " ".repeat((column as usize).saturating_sub(1));
        out.push(format!("{}^", caret_pad));
    }
    for (i, suggestion) in suggestions.iter().enumerate() {
        out.push(format!("  {}. {}", i + 1, suggestion));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn driver(tmp: &TempDir) -> BootstrapDriver {
        let config = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out"))
            .with_base_dir(tmp.path());
        BootstrapDriver::new(config)
    }

    #[test]
    fn test_flat_names_avoid_collisions() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "examples/hello.oriz", "func main() { a(); }");
        write_file(
            tmp.path(),
            "bootstrap_samples/hello.oriz",
            "func main() { b(); }",
        );
        let summary = driver(&tmp).run(&[tmp.path().to_path_buf()]);
        assert_eq!(summary.failed(), 0, "{}", summary.render());
        let out = tmp.path().join("out");
        assert!(out.join("examples.hello.mir").is_file());
        assert!(out.join("bootstrap_samples.hello.mir").is_file());
        let a = fs::read_to_string(out.join("examples.hello.mir")).unwrap();
        let b = fs::read_to_string(out.join("bootstrap_samples.hello.mir")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_all_three_artifacts_by_default() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "m.oriz", "func main() { }");
        let summary = driver(&tmp).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.passed(), 1);
        let out = tmp.path().join("out");
        assert!(out.join("m.mir").is_file());
        assert!(out.join("m.lir").is_file());
        assert!(out.join("m.x64").is_file());
    }

    #[test]
    fn test_emit_subset() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "m.oriz", "func main() { }");
        let config = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out"))
            .with_base_dir(tmp.path())
            .with_emits(true, false, false);
        let summary = BootstrapDriver::new(config).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.passed(), 1);
        let out = tmp.path().join("out");
        assert!(out.join("m.mir").is_file());
        assert!(!out.join("m.lir").exists());
        assert!(!out.join("m.x64").exists());
    }

    #[test]
    fn test_missing_golden_fails_without_update() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "m.oriz", "func main() { }");
        let config = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out"))
            .with_base_dir(tmp.path())
            .with_golden_dir(tmp.path().join("golden"));
        let summary = BootstrapDriver::new(config).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.failed(), 1);
        let rendered = summary.render();
        assert!(rendered.contains("missing golden"), "{}", rendered);
    }

    #[test]
    fn test_update_then_verify_golden() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "m.oriz", "func main() { greet(); }");
        let golden_dir = tmp.path().join("golden");

        let update = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out"))
            .with_base_dir(tmp.path())
            .with_golden_dir(&golden_dir)
            .with_update_golden(true);
        let summary = BootstrapDriver::new(update).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.failed(), 0, "{}", summary.render());
        assert!(golden_dir.join("m.mir").is_file());

        let verify = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out2"))
            .with_base_dir(tmp.path())
            .with_golden_dir(&golden_dir);
        let summary = BootstrapDriver::new(verify).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.failed(), 0, "{}", summary.render());
    }

    #[test]
    fn test_golden_mismatch_reported() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "m.oriz", "func main() { }");
        let golden_dir = tmp.path().join("golden");
        fs::create_dir_all(&golden_dir).unwrap();
        fs::write(golden_dir.join("m.mir"), "stale\n").unwrap();
        fs::write(golden_dir.join("m.lir"), "stale\n").unwrap();
        fs::write(golden_dir.join("m.x64"), "stale\n").unwrap();

        let config = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out"))
            .with_base_dir(tmp.path())
            .with_golden_dir(&golden_dir);
        let summary = BootstrapDriver::new(config).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.failed(), 1);
        assert!(summary.render().contains("golden mismatch"), "{}", summary.render());
    }

    #[test]
    fn test_parse_failure_reports_diagnostic() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "bad.oriz", "\"unterminated string literal");
        let summary = driver(&tmp).run(&[tmp.path().join("bad.oriz")]);
        assert_eq!(summary.failed(), 1);
        let rendered = summary.render();
        assert!(rendered.contains("FAIL"), "{}", rendered);
        assert!(rendered.contains("bad.oriz:1:1: error:"), "{}", rendered);
        assert!(rendered.contains("^"), "{}", rendered);
    }

    #[test]
    fn test_deterministic_artifacts() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "m.oriz",
            "func f(n: i64) -> i64 { var a = 0; while a < n { a += 1; } return a; }",
        );
        driver(&tmp).run(&[tmp.path().join("m.oriz")]);
        let first = fs::read(tmp.path().join("out/m.x64")).unwrap();
        driver(&tmp).run(&[tmp.path().join("m.oriz")]);
        let second = fs::read(tmp.path().join("out/m.x64")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_directory_walk_sorted() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/b.oriz", "func main() { }");
        write_file(tmp.path(), "src/a.oriz", "func main() { }");
        write_file(tmp.path(), "src/readme.txt", "not a source file");
        let summary = driver(&tmp).run(&[tmp.path().join("src")]);
        let names: Vec<_> = summary
            .outcomes
            .iter()
            .map(|o| o.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.oriz", "b.oriz"]);
    }

    #[test]
    fn test_summary_line() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "good.oriz", "func main() { }");
        write_file(tmp.path(), "bad.oriz", "func (");
        let summary = driver(&tmp).run(&[tmp.path().to_path_buf()]);
        assert!(summary.render().ends_with("1 passed, 1 failed\n"));
    }

    #[test]
    fn test_macro_expansion_toggle() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "m.oriz",
            "macro m() { x(); }\nfunc main() { m!(); }",
        );
        // Without expansion the invocation survives and HIR rejects it.
        let summary = driver(&tmp).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.failed(), 1);
        assert!(summary.render().contains("unresolved macro"), "{}", summary.render());

        let config = CompilerConfig::new()
            .with_out_dir(tmp.path().join("out"))
            .with_base_dir(tmp.path())
            .with_expand_macros(true);
        let summary = BootstrapDriver::new(config).run(&[tmp.path().join("m.oriz")]);
        assert_eq!(summary.failed(), 0, "{}", summary.render());
        let mir = fs::read_to_string(tmp.path().join("out/m.mir")).unwrap();
        assert!(mir.contains("call x"), "{}", mir);
    }
}
