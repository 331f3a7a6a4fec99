//! Shared testing utilities for certificado CLI tests.

use assert_cmd::Command;
use base64::{engine::general_purpose, Engine as _};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated working directory holding a copy of the shipped assets.
#[allow(dead_code)]
pub struct TestContext {
    root: TempDir,
}

#[allow(dead_code)]
impl TestContext {
    /// Working directory with `gerador_certificado/` copied in.
    pub fn new() -> Self {
        let ctx = Self::empty();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("gerador_certificado");
        let assets = ctx.assets_dir();
        fs::create_dir_all(assets.join("img")).expect("Failed to create assets directory");
        fs::copy(shipped.join("template.html"), assets.join("template.html"))
            .expect("Failed to copy template");
        fs::copy(shipped.join("img/moldura.png"), assets.join("img/moldura.png"))
            .expect("Failed to copy image");
        ctx
    }

    /// Working directory without any assets.
    pub fn empty() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory for tests");
        Self { root }
    }

    pub fn work_dir(&self) -> &Path {
        self.root.path()
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.work_dir().join("gerador_certificado")
    }

    /// Replaces the template with `source`.
    pub fn write_template(&self, name: &str, source: &str) {
        fs::create_dir_all(self.assets_dir()).expect("Failed to create assets directory");
        fs::write(self.assets_dir().join(name), source).expect("Failed to write template");
    }

    /// Command for the compiled binary, run inside the work directory.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("certificado").expect("Failed to locate certificado binary");
        cmd.current_dir(self.work_dir()).env_remove("RUST_LOG");
        cmd
    }
}

/// Base64 payload for the single-argument call shape.
#[allow(dead_code)]
pub fn payload(json: &str) -> String {
    general_purpose::STANDARD.encode(json)
}
