//! Image renderer — drives the OnnxStream Stable Diffusion binary.
//!
//! One blocking subprocess per render, run from the curator task with a
//! bounded timeout. This is the longest step of a cycle by far (minutes
//! on a Pi), so it must never run on the request-serving path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::error::{GalleryError, Result};

/// Renderer configuration plus invocation.
pub struct Renderer {
    bin: PathBuf,
    models_dir: PathBuf,
    steps: u32,
    size: u32,
    timeout: Duration,
}

impl Renderer {
    pub fn new(bin: PathBuf, models_dir: PathBuf, steps: u32, size: u32, timeout: Duration) -> Self {
        Self {
            bin,
            models_dir,
            steps,
            size,
            timeout,
        }
    }

    /// Render `prompt` to `out_path` (square, `size`×`size`).
    ///
    /// Creates the parent directory, runs the binary to completion, and
    /// verifies the output file actually exists — the sd binary has been
    /// seen to exit 0 without writing anything.
    pub async fn render(&self, prompt: &str, out_path: &Path) -> Result<()> {
        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GalleryError::Render(format!("mkdir {}: {e}", parent.display())))?;
        }

        let res = format!("{}x{}", self.size, self.size);
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.bin)
                .arg("--turbo")
                .arg("--models-path")
                .arg(&self.models_dir)
                .arg("--prompt")
                .arg(prompt)
                .arg("--steps")
                .arg(self.steps.to_string())
                .arg("--res")
                .arg(&res)
                .arg("--output")
                .arg(out_path)
                .output(),
        )
        .await
        .map_err(|_| {
            GalleryError::Render(format!(
                "{} timed out after {:?}",
                self.bin.display(),
                self.timeout
            ))
        })?
        .map_err(|e| GalleryError::Render(format!("spawn {}: {e}", self.bin.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let head: String = stderr.chars().take(500).collect();
            return Err(GalleryError::Render(format!(
                "exit {}: {head}",
                output.status.code().unwrap_or(-1)
            )));
        }

        if !out_path.exists() {
            return Err(GalleryError::Render(format!(
                "renderer claimed success but {} does not exist",
                out_path.display()
            )));
        }

        Ok(())
    }
}
