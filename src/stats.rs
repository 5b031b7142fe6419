//! Per-scope submission report.
//!
//! Shows how many submissions each scope holds and how many were rejected,
//! so an instructor can see at a glance where duplicates cluster.

use anyhow::Result;

use copycat_core::{ScopeSummary, SubmissionRepository};

use crate::config::Config;
use crate::db;
use crate::sqlite_repo::SqliteRepository;

pub async fn run_stats(config: &Config, scope: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let repo = SqliteRepository::new(pool);

    let summaries: Vec<ScopeSummary> = match scope {
        Some(s) => vec![repo.scope_summary(s).await?],
        None => repo.all_scope_summaries().await?,
    };

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Copycat — Submission Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();

    if summaries.is_empty() {
        println!("  No submissions yet.");
    } else {
        println!(
            "  {:<24} {:>7} {:>9} {:>9} {:>8}",
            "SCOPE", "TOTAL", "ACCEPTED", "REJECTED", "REJ %"
        );
        println!("  {}", "-".repeat(61));
        for s in &summaries {
            println!(
                "  {:<24} {:>7} {:>9} {:>9} {:>7}%",
                s.scope_id,
                s.total,
                s.accepted,
                s.rejected,
                s.rejection_rate()
            );
        }
    }

    println!();

    repo.pool().close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
