//! Test harness for tests that need files on disk.
//!
//! The `TestHarness` struct owns a temporary directory holding a copy of the
//! conference taxonomy fixture plus whatever config files a test writes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::builders::fixture_path;

pub struct TestHarness {
    temp_dir: TempDir,
    taxonomy_path: PathBuf,
}

impl TestHarness {
    /// Create a harness with the conference taxonomy copied in.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let taxonomy_path = temp_dir.path().join("taxonomy.yaml");
        std::fs::copy(fixture_path("conference-taxonomy.yaml"), &taxonomy_path)
            .expect("Failed to copy taxonomy fixture");

        Self {
            temp_dir,
            taxonomy_path,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn taxonomy_path(&self) -> String {
        self.taxonomy_path.display().to_string()
    }

    /// Write an extra file (an overlay taxonomy, say) and return its path.
    pub fn write_file(&self, name: &str, content: &str) -> String {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write test file");
        path.display().to_string()
    }

    /// Write `config.json` and return its path.
    pub fn write_config(&self, config_json: &str) -> PathBuf {
        let path = self.temp_dir.path().join("config.json");
        std::fs::write(&path, config_json).expect("Failed to write config");
        path
    }
}
