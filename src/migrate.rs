use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // One row per evaluated submission, verdict included.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            scope_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            format TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            normalized_text TEXT,
            fingerprint_collision INTEGER NOT NULL DEFAULT 0,
            score REAL NOT NULL,
            best_match_id TEXT,
            best_match_author TEXT,
            status TEXT NOT NULL,
            reason TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            seq INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_submissions_scope_seq ON submissions(scope_id, seq)",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_submissions_scope_fingerprint ON submissions(scope_id, fingerprint)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
