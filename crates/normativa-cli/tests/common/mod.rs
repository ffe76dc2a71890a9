//! Shared test utilities for normativa-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Small regulatory corpus: one current rule, one revoked rule, one unrelated act.
pub const CORPUS: &str = r#"{"content":"O relatório mensal deve ser entregue até o dia 10 de cada mês ao órgão regulador.","metadata":{"fonte":"Resolução 5.000","pagina":4,"tipo":"Resolução","precedencia":1,"status":"Vigente"}}
{"content":"O relatório anual era entregue até o dia 10 de março.","metadata":{"fonte":"Resolução 1.200","pagina":2,"tipo":"Resolução","status":"Revogado"}}
{"content":"Tarifas de pedágio são reajustadas anualmente.","metadata":{"fonte":"Portaria 30","pagina":1,"tipo":"Portaria"}}
"#;

/// A temp directory holding `corpus.jsonl` and `config.yaml`.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Corpus plus a config pointing at it (relative path).
    pub fn new() -> Self {
        Self::with_config("corpus: corpus.jsonl\n")
    }

    /// Corpus plus a custom config body.
    pub fn with_config(config: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(dir.path().join("corpus.jsonl"), CORPUS).expect("write corpus");
        fs::write(dir.path().join("config.yaml"), config).expect("write config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    /// A command bound to this fixture's config, with colors off.
    pub fn cmd(&self) -> Command {
        let mut cmd = normativa_cmd();
        cmd.arg("--config").arg(self.config_path()).arg("--color").arg("never");
        cmd
    }
}

/// Get a Command for the normativa binary with a clean environment.
///
/// # Panics
///
/// Panics if the normativa binary cannot be found.
#[allow(deprecated)]
pub fn normativa_cmd() -> Command {
    let mut cmd = Command::cargo_bin("normativa").expect("normativa binary should exist");
    for var in [
        "NORMATIVA_VERBOSE",
        "NORMATIVA_QUIET",
        "NORMATIVA_CONFIG",
        "NORMATIVA_CORPUS",
        "NORMATIVA_COLOR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}
