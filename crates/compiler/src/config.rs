//! Compiler configuration
//!
//! Builder-style options consumed by the bootstrap driver and the library
//! entry points. Error-recovery bounds nest here and can be loaded from
//! TOML (see [`crate::recovery::RecoveryConfig`]).

use crate::recovery::RecoveryConfig;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub emit_mir: bool,
    pub emit_lir: bool,
    pub emit_x64: bool,
    pub expand_macros: bool,
    pub out_dir: PathBuf,
    pub golden_dir: Option<PathBuf>,
    pub update_golden: bool,
    /// Base for computing flat snapshot names; the working directory when
    /// unset.
    pub base_dir: Option<PathBuf>,
    pub recovery: RecoveryConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            emit_mir: true,
            emit_lir: true,
            emit_x64: true,
            expand_macros: false,
            out_dir: PathBuf::from("artifacts/selfhost"),
            golden_dir: None,
            update_golden: false,
            base_dir: None,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn with_golden_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.golden_dir = Some(dir.into());
        self
    }

    pub fn with_update_golden(mut self, update: bool) -> Self {
        self.update_golden = update;
        self
    }

    pub fn with_expand_macros(mut self, expand: bool) -> Self {
        self.expand_macros = expand;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_emits(mut self, mir: bool, lir: bool, x64: bool) -> Self {
        self.emit_mir = mir;
        self.emit_lir = lir;
        self.emit_x64 = x64;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::new();
        assert!(config.emit_mir && config.emit_lir && config.emit_x64);
        assert!(!config.expand_macros);
        assert!(!config.update_golden);
        assert_eq!(config.out_dir, PathBuf::from("artifacts/selfhost"));
        assert!(config.golden_dir.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = CompilerConfig::new()
            .with_out_dir("out")
            .with_golden_dir("golden")
            .with_update_golden(true)
            .with_expand_macros(true)
            .with_emits(true, false, false);
        assert_eq!(config.out_dir, PathBuf::from("out"));
        assert_eq!(config.golden_dir, Some(PathBuf::from("golden")));
        assert!(config.update_golden);
        assert!(config.expand_macros);
        assert!(config.emit_mir && !config.emit_lir && !config.emit_x64);
    }
}
