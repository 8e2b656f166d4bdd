//! Incremental lexing with a content-hashed token cache
//!
//! Editor tooling re-lexes files on every keystroke; this layer makes that
//! cheap. Each file's tokens are cached under a SHA-256 digest of the file
//! content. A matching digest returns the cached tokens without touching the
//! lexer; any mismatch performs a full re-lex and replaces the entry, so the
//! observable token sequence is always identical to a fresh lex.
//!
//! Differential re-lexing over [`Change`] records is an accepted future
//! refinement: changes are coalesced and the damaged range is computed, but
//! today they only inform logging. Correctness requires that a cache entry
//! is never reused when the digest differs.
//!
//! Cache reads take a shared lock; cache updates take an exclusive lock.
//! Distinct files may be lexed in parallel; a single file serializes on the
//! cache entry replacement.

use crate::lexer::Lexer;
use crate::recovery::{LexicalError, RecoveryConfig};
use orizon_core::span::SourceMap;
use orizon_core::token::{Token, TokenKind};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single text edit: `old_len` bytes at `start` replaced by `new_len` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub start: usize,
    pub old_len: usize,
    pub new_len: usize,
}

impl Change {
    pub fn new(start: usize, old_len: usize, new_len: usize) -> Self {
        Change {
            start,
            old_len,
            new_len,
        }
    }

    fn old_end(&self) -> usize {
        self.start + self.old_len
    }
}

/// Merge overlapping or adjacent changes into a minimal sorted set.
pub fn coalesce_changes(changes: &[Change]) -> Vec<Change> {
    let mut sorted: Vec<Change> = changes.to_vec();
    sorted.sort_by_key(|c| c.start);
    let mut out: Vec<Change> = Vec::with_capacity(sorted.len());
    for change in sorted {
        match out.last_mut() {
            Some(prev) if change.start <= prev.old_end() => {
                let old_end = prev.old_end().max(change.old_end());
                prev.old_len = old_end - prev.start;
                prev.new_len += change.new_len;
            }
            _ => out.push(change),
        }
    }
    out
}

/// Why a cached token cannot be reused independently of its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDependency {
    /// String content interpolates surrounding context (`${...}`).
    StringInterpolation,
    /// Block comments: a boundary edit can swallow following tokens.
    CommentNesting,
    /// Macro markers change how the following tokens parse.
    MacroExpansion,
    /// Identifier doubles as a contextual keyword (`throw`, `try`, `catch`).
    Contextual,
}

/// Dependency annotations for one token, if any.
fn dependencies_of(token: &Token) -> Vec<TokenDependency> {
    let mut deps = Vec::new();
    match token.kind {
        TokenKind::Str if token.literal.contains("${") => {
            deps.push(TokenDependency::StringInterpolation);
        }
        TokenKind::Comment if token.literal.starts_with("/*") => {
            deps.push(TokenDependency::CommentNesting);
        }
        TokenKind::MacroInvoke | TokenKind::Backquote => {
            deps.push(TokenDependency::MacroExpansion);
        }
        TokenKind::Identifier
            if matches!(token.literal.as_str(), "throw" | "try" | "catch") =>
        {
            deps.push(TokenDependency::Contextual);
        }
        _ => {}
    }
    deps
}

/// Cached lex result for one file.
#[derive(Debug)]
pub struct TokenCache {
    pub content_hash: [u8; 32],
    pub tokens: Vec<Token>,
    pub dependencies: Vec<Vec<TokenDependency>>,
    pub errors: Vec<LexicalError>,
    pub line_starts: Vec<usize>,
    pub file_size: usize,
    /// Seconds since the epoch of the last lookup or refresh.
    last_access: AtomicU64,
}

impl TokenCache {
    fn touch(&self) {
        self.last_access.store(now_secs(), Ordering::Relaxed);
    }

    pub fn last_access_secs(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Aggregate cache counters for tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Result of an incremental lex: tokens plus the errors a fresh lex of the
/// same content would report.
#[derive(Debug, Clone)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexicalError>,
    /// Whether the cache satisfied this request without re-lexing.
    pub cache_hit: bool,
}

/// Token cache shared across lexing invocations.
pub struct IncrementalLexer {
    caches: RwLock<HashMap<PathBuf, Arc<TokenCache>>>,
    config: RecoveryConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for IncrementalLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalLexer {
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        IncrementalLexer {
            caches: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Lex `content` for `file`, reusing the cache when the content digest
    /// is unchanged. Behavior is identical to a fresh full lex.
    pub fn lex(&self, file: &Path, content: &str, changes: &[Change]) -> LexOutput {
        let hash = content_hash(content);

        {
            let caches = self.caches.read().expect("token cache poisoned");
            if let Some(cache) = caches.get(file) {
                if cache.content_hash == hash {
                    cache.touch();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(file = %file.display(), "token cache hit");
                    return LexOutput {
                        tokens: cache.tokens.clone(),
                        errors: cache.errors.clone(),
                        cache_hit: true,
                    };
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let coalesced = coalesce_changes(changes);
        if !coalesced.is_empty() {
            tracing::debug!(
                file = %file.display(),
                changes = coalesced.len(),
                first = coalesced[0].start,
                "content changed, full re-lex"
            );
        }

        let mut lexer = Lexer::with_config(content, self.config.clone());
        let tokens = lexer.tokenize();
        let errors = lexer.take_errors();
        let dependencies = tokens.iter().map(dependencies_of).collect();
        let cache = Arc::new(TokenCache {
            content_hash: hash,
            tokens: tokens.clone(),
            dependencies,
            errors: errors.clone(),
            line_starts: SourceMap::new(content).line_starts().to_vec(),
            file_size: content.len(),
            last_access: AtomicU64::new(now_secs()),
        });

        let mut caches = self.caches.write().expect("token cache poisoned");
        caches.insert(file.to_path_buf(), cache);

        LexOutput {
            tokens,
            errors,
            cache_hit: false,
        }
    }

    /// Current cache entry for a file, if any.
    pub fn cache_entry(&self, file: &Path) -> Option<Arc<TokenCache>> {
        self.caches
            .read()
            .expect("token cache poisoned")
            .get(file)
            .cloned()
    }

    /// Drop the entry for one file.
    pub fn invalidate(&self, file: &Path) {
        self.caches
            .write()
            .expect("token cache poisoned")
            .remove(file);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.caches.write().expect("token cache poisoned").clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.caches.read().expect("token cache poisoned").len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// SHA-256 digest of the file content.
pub fn content_hash(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.finalize().into()
}

/// Hex rendering of a content hash, for logs and dumps.
pub fn content_hash_hex(content: &str) -> String {
    hex::encode(content_hash(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    #[test]
    fn test_cache_transparency() {
        let inc = IncrementalLexer::new();
        let file = Path::new("a.oriz");
        let content = "func main() { let x = 1 + 2; }";

        let fresh = lexer::lex(content);
        let first = inc.lex(file, content, &[]);
        assert!(!first.cache_hit);
        assert_eq!(first.tokens, fresh.0);
        assert_eq!(first.errors, fresh.1);

        let second = inc.lex(file, content, &[]);
        assert!(second.cache_hit);
        assert_eq!(second.tokens, fresh.0);
        assert_eq!(second.errors, fresh.1);
    }

    #[test]
    fn test_changed_content_relexes() {
        let inc = IncrementalLexer::new();
        let file = Path::new("a.oriz");
        inc.lex(file, "let x = 1;", &[]);
        let out = inc.lex(file, "let x = 2;", &[Change::new(8, 1, 1)]);
        assert!(!out.cache_hit);
        assert_eq!(out.tokens, lexer::lex("let x = 2;").0);
        let stats = inc.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_errors_survive_cache_hits() {
        let inc = IncrementalLexer::new();
        let file = Path::new("bad.oriz");
        let content = "\"open";
        let first = inc.lex(file, content, &[]);
        let second = inc.lex(file, content, &[]);
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.errors.len(), 1);
    }

    #[test]
    fn test_coalesce_changes() {
        // Overlapping and adjacent edits merge; disjoint ones stay apart.
        let merged = coalesce_changes(&[
            Change::new(10, 5, 2),
            Change::new(12, 6, 1),
            Change::new(40, 0, 3),
        ]);
        assert_eq!(
            merged,
            vec![Change::new(10, 8, 3), Change::new(40, 0, 3)]
        );

        let adjacent = coalesce_changes(&[Change::new(0, 2, 2), Change::new(2, 2, 2)]);
        assert_eq!(adjacent, vec![Change::new(0, 4, 4)]);

        assert!(coalesce_changes(&[]).is_empty());
    }

    #[test]
    fn test_cache_entry_metadata() {
        let inc = IncrementalLexer::new();
        let file = Path::new("meta.oriz");
        let content = "let a = 1;\nlet b = 2;\n";
        inc.lex(file, content, &[]);
        let entry = inc.cache_entry(file).unwrap();
        assert_eq!(entry.file_size, content.len());
        assert_eq!(entry.line_starts, vec![0, 11, 22]);
        assert_eq!(entry.content_hash, content_hash(content));
        assert_eq!(entry.tokens.len(), entry.dependencies.len());
    }

    #[test]
    fn test_dependency_annotations() {
        let inc = IncrementalLexer::new();
        let file = Path::new("dep.oriz");
        inc.lex(file, "m!() /* c */ try", &[]);
        let entry = inc.cache_entry(file).unwrap();
        let mut flat: Vec<TokenDependency> =
            entry.dependencies.iter().flatten().copied().collect();
        flat.sort_by_key(|d| match d {
            TokenDependency::StringInterpolation => 0,
            TokenDependency::CommentNesting => 1,
            TokenDependency::MacroExpansion => 2,
            TokenDependency::Contextual => 3,
        });
        assert_eq!(
            flat,
            vec![
                TokenDependency::CommentNesting,
                TokenDependency::MacroExpansion,
                TokenDependency::Contextual,
            ]
        );
    }

    #[test]
    fn test_invalidate_and_clear() {
        let inc = IncrementalLexer::new();
        let a = Path::new("a.oriz");
        let b = Path::new("b.oriz");
        inc.lex(a, "1", &[]);
        inc.lex(b, "2", &[]);
        assert_eq!(inc.stats().entries, 2);
        inc.invalidate(a);
        assert!(inc.cache_entry(a).is_none());
        assert!(inc.cache_entry(b).is_some());
        inc.clear();
        assert_eq!(inc.stats().entries, 0);
    }

    #[test]
    fn test_parallel_files() {
        let inc = IncrementalLexer::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let inc = &inc;
                s.spawn(move || {
                    let name = format!("f{}.oriz", i % 2);
                    let content = format!("let x = {};", i % 2);
                    for _ in 0..50 {
                        let out = inc.lex(Path::new(&name), &content, &[]);
                        assert_eq!(out.tokens, lexer::lex(&content).0);
                    }
                });
            }
        });
        assert_eq!(inc.stats().entries, 2);
    }
}
