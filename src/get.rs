//! Submission lookup by ID.

use anyhow::{bail, Result};

use copycat_core::{SubmissionRecord, SubmissionRepository};

use crate::config::Config;
use crate::db;
use crate::sqlite_repo::SqliteRepository;

pub async fn get_submission(config: &Config, id: &str) -> Result<SubmissionRecord> {
    let pool = db::connect(config).await?;
    let repo = SqliteRepository::new(pool);
    let record = repo.get_submission(id).await;
    repo.pool().close().await;

    match record? {
        Some(r) => Ok(r),
        None => bail!("submission not found: {}", id),
    }
}

/// CLI entry point. Prints the stored record, or exits 1 if it is missing.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let record = match get_submission(config, id).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let v = &record.verdict;

    println!("--- Submission ---");
    println!("id:          {}", v.submission_id);
    println!("author:      {}", record.author_id);
    println!("scope:       {}", record.scope_id);
    println!("format:      {}", record.format);
    println!(
        "created_at:  {}",
        v.created_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!("fingerprint: {}", v.fingerprint);
    println!();

    println!("--- Verdict ---");
    println!("status:      {}", v.status);
    println!("score:       {:.4}", v.score);
    println!("reason:      {}", v.reason);
    if v.fingerprint_collision {
        println!("collision:   yes");
    }
    if let Some(ref m) = v.best_match {
        println!("best_match:  {} ({})", m.document_id, m.author_id);
    }
    println!();

    println!("--- Normalized text ---");
    println!(
        "{}",
        record.normalized_text.as_deref().unwrap_or("(unreadable)")
    );

    Ok(())
}
