//! SQLite-backed [`SubmissionRepository`].
//!
//! Every submission, accepted or rejected, is one row of `submissions`.
//! The `seq` column records insertion order, which is the corpus order the
//! engine relies on for "earliest match wins".

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use copycat_core::{
    BestMatch, CorpusEntry, Fingerprint, ScopeSummary, SubmissionRecord, SubmissionRepository,
    Verdict, VerdictStatus,
};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Counts for every scope that has submissions, busiest first.
    pub async fn all_scope_summaries(&self) -> Result<Vec<ScopeSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                scope_id,
                COUNT(*) AS total,
                SUM(CASE WHEN status = 'accepted' THEN 1 ELSE 0 END) AS accepted,
                SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END) AS rejected
            FROM submissions
            GROUP BY scope_id
            ORDER BY total DESC, scope_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ScopeSummary {
                scope_id: row.get("scope_id"),
                total: row.get("total"),
                accepted: row.get("accepted"),
                rejected: row.get("rejected"),
            })
            .collect())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<SubmissionRecord> {
    let status: String = row.get("status");
    let created_at: i64 = row.get("created_at");
    let best_match_id: Option<String> = row.get("best_match_id");
    let best_match_author: Option<String> = row.get("best_match_author");

    let best_match = match (best_match_id, best_match_author) {
        (Some(document_id), Some(author_id)) => Some(BestMatch {
            document_id,
            author_id,
        }),
        _ => None,
    };

    let created_at = chrono::DateTime::from_timestamp_millis(created_at)
        .with_context(|| format!("invalid created_at timestamp: {}", created_at))?;

    Ok(SubmissionRecord {
        author_id: row.get("author_id"),
        scope_id: row.get("scope_id"),
        format: row.get("format"),
        normalized_text: row.get("normalized_text"),
        verdict: Verdict {
            submission_id: row.get("id"),
            fingerprint: Fingerprint::from_hex(row.get::<String, _>("fingerprint")),
            fingerprint_collision: row.get::<i64, _>("fingerprint_collision") != 0,
            score: row.get("score"),
            best_match,
            status: status.parse::<VerdictStatus>()?,
            reason: row.get("reason"),
            created_at,
        },
    })
}

#[async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn list_corpus(
        &self,
        scope_id: &str,
        exclude_author: Option<&str>,
    ) -> Result<Vec<CorpusEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, author_id, fingerprint, normalized_text
            FROM submissions
            WHERE scope_id = ?
              AND (? IS NULL OR author_id != ?)
            ORDER BY seq ASC
            "#,
        )
        .bind(scope_id)
        .bind(exclude_author)
        .bind(exclude_author)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list corpus for scope {}", scope_id))?;

        Ok(rows
            .iter()
            .map(|row| CorpusEntry {
                id: row.get("id"),
                author_id: row.get("author_id"),
                fingerprint: Fingerprint::from_hex(row.get::<String, _>("fingerprint")),
                normalized_text: row.get("normalized_text"),
            })
            .collect())
    }

    async fn record(&self, record: &SubmissionRecord) -> Result<()> {
        let v = &record.verdict;
        sqlx::query(
            r#"
            INSERT INTO submissions (id, scope_id, author_id, format, fingerprint,
                                     normalized_text, fingerprint_collision, score,
                                     best_match_id, best_match_author, status, reason,
                                     created_at, seq)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM submissions))
            "#,
        )
        .bind(&v.submission_id)
        .bind(&record.scope_id)
        .bind(&record.author_id)
        .bind(&record.format)
        .bind(v.fingerprint.as_str())
        .bind(&record.normalized_text)
        .bind(v.fingerprint_collision as i64)
        .bind(v.score)
        .bind(v.best_match.as_ref().map(|m| m.document_id.as_str()))
        .bind(v.best_match.as_ref().map(|m| m.author_id.as_str()))
        .bind(v.status.as_str())
        .bind(&v.reason)
        .bind(v.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to record submission {}", v.submission_id))?;

        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        let row = sqlx::query("SELECT * FROM submissions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn scope_summary(&self, scope_id: &str) -> Result<ScopeSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'accepted' THEN 1 ELSE 0 END), 0) AS accepted,
                COALESCE(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejected
            FROM submissions
            WHERE scope_id = ?
            "#,
        )
        .bind(scope_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ScopeSummary {
            scope_id: scope_id.to_string(),
            total: row.get("total"),
            accepted: row.get("accepted"),
            rejected: row.get("rejected"),
        })
    }
}
