//! `copycat compare`: one-off similarity of two files under a scope's model.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::submit::resolve_format;

pub async fn run_compare(config: &Config, a: &Path, b: &Path, scope: &str) -> Result<()> {
    let a_bytes = std::fs::read(a).with_context(|| format!("Failed to read file: {}", a.display()))?;
    let b_bytes = std::fs::read(b).with_context(|| format!("Failed to read file: {}", b.display()))?;

    let pipeline = Pipeline::open(config).await?;
    let a_text = pipeline
        .engine
        .normalized_text(&a_bytes, &resolve_format(a, None))
        .await;
    let b_text = pipeline
        .engine
        .normalized_text(&b_bytes, &resolve_format(b, None))
        .await;
    let score = pipeline.engine.compare(scope, &a_text, &b_text).await;
    pipeline.close().await;
    let score = score?;

    println!("similarity: {:.4}", score);
    Ok(())
}
