//! `copycat submit`: evaluate one file and record its verdict.

use anyhow::{Context, Result};
use std::path::Path;

use copycat_core::{Format, Verdict};

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Resolve the declared format: an explicit override, else the file extension.
pub fn resolve_format(path: &Path, format: Option<&str>) -> Format {
    match format {
        Some(f) => f.parse().unwrap_or(Format::Unknown(f.to_string())),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(Format::from_file_name)
            .unwrap_or(Format::Unknown(String::new())),
    }
}

pub async fn evaluate_file(
    config: &Config,
    path: &Path,
    author: &str,
    scope: &str,
    format: Option<&str>,
) -> Result<Verdict> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let format = resolve_format(path, format);

    let pipeline = Pipeline::open(config).await?;
    let verdict = pipeline
        .engine
        .evaluate(&bytes, &format, author, scope)
        .await;
    pipeline.close().await;

    Ok(verdict?)
}

pub async fn run_submit(
    config: &Config,
    path: &Path,
    author: &str,
    scope: &str,
    format: Option<&str>,
    json: bool,
) -> Result<()> {
    let verdict = evaluate_file(config, path, author, scope, format).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        return Ok(());
    }

    println!("--- Verdict ---");
    println!("id:          {}", verdict.submission_id);
    println!("status:      {}", verdict.status);
    println!("score:       {:.4}", verdict.score);
    println!("reason:      {}", verdict.reason);
    println!("fingerprint: {}", verdict.fingerprint);
    if verdict.fingerprint_collision {
        println!("collision:   yes");
    }
    if let Some(ref m) = verdict.best_match {
        println!("best_match:  {} ({})", m.document_id, m.author_id);
    }

    Ok(())
}
