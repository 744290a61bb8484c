//! Shared test helpers for core integration tests.

#![allow(dead_code)]

use berth_core::config::{ConfigHolder, ExtensionConfig};
use std::path::PathBuf;
use tempfile::TempDir;

/// Executable shell script standing in for the container CLI
pub struct StubBinary {
    _dir: TempDir,
    pub path: PathBuf,
}

impl StubBinary {
    /// Write `body` after a `#!/bin/sh` line and make it executable
    pub fn new(body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { _dir: dir, path }
    }

    pub fn config(&self) -> ExtensionConfig {
        ExtensionConfig {
            binary_path: self.path.display().to_string(),
            ..Default::default()
        }
    }

    pub fn holder(&self) -> ConfigHolder {
        ConfigHolder::new(self.config())
    }
}

pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
