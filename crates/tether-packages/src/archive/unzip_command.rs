//! Host `unzip` utility strategy

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

use super::ExtractStrategy;

/// Shells out to an `unzip`-compatible program
///
/// Runs non-interactively: overwrite without prompting, stdin closed.
#[derive(Debug, Clone)]
pub struct UnzipCommandStrategy {
    program: String,
}

impl UnzipCommandStrategy {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for UnzipCommandStrategy {
    fn default() -> Self {
        Self::new("unzip")
    }
}

impl ExtractStrategy for UnzipCommandStrategy {
    fn name(&self) -> &'static str {
        "unzip-command"
    }

    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-o")
            .arg("-qq")
            .arg(archive)
            .arg("-d")
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }
        Ok(())
    }
}
