//! OCR through the `tesseract` command-line tool.
//!
//! The image is piped to `tesseract stdin stdout -l <lang>` and the
//! recognized text is read back from stdout. A wall-clock timeout bounds
//! each call; on expiry the child is killed and the call fails with
//! [`ExtractionFailure::OcrTimeout`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use copycat_core::{ExtractionFailure, OcrEngine};

use crate::config::OcrConfig;

pub struct TesseractOcr {
    command: String,
    language: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String, ExtractionFailure> {
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionFailure::Ocr(format!("failed to run '{}': {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractionFailure::Ocr("stdin unavailable".to_string()))?;

        let write = async move {
            // A child that exits without reading closes the pipe early.
            let _ = stdin.write_all(image).await;
        };
        let run = async {
            let ((), output) = tokio::join!(write, child.wait_with_output());
            output
        };

        // Dropping `run` on expiry drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ExtractionFailure::OcrTimeout(self.timeout.as_secs()))?
            .map_err(|e| ExtractionFailure::Ocr(e.to_string()))?;

        if !output.status.success() {
            return Err(ExtractionFailure::Ocr(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(chars = text.len(), "tesseract finished");
        Ok(text)
    }
}
