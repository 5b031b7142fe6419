//! Core data models used throughout Copycat.
//!
//! These types describe what flows between the engine and its repository:
//! declared formats, corpus entries, stored submission records, and the
//! [`Verdict`] attached to every evaluated submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::fingerprint::Fingerprint;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// Raster formats accepted for OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// Declared format of an uploaded payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    PlainText,
    Pdf,
    Image(ImageKind),
    /// Anything else. Extraction degrades to empty text.
    Unknown(String),
}

impl Format {
    /// Infer the format from a file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Format::PlainText,
            "pdf" => Format::Pdf,
            "png" => Format::Image(ImageKind::Png),
            "jpg" | "jpeg" => Format::Image(ImageKind::Jpeg),
            other => Format::Unknown(other.to_string()),
        }
    }

    /// Infer the format from a file name such as `essay.PDF`.
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Format::Unknown(String::new()),
        }
    }

    /// Map a MIME content-type (parameters such as `; charset=utf-8` are ignored).
    pub fn from_content_type(content_type: &str) -> Self {
        let base = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            MIME_TEXT => Format::PlainText,
            MIME_PDF => Format::Pdf,
            MIME_PNG => Format::Image(ImageKind::Png),
            MIME_JPEG | "image/jpg" => Format::Image(ImageKind::Jpeg),
            _ => Format::Unknown(base),
        }
    }

    /// Stable label persisted alongside a submission.
    pub fn label(&self) -> &str {
        match self {
            Format::PlainText => "txt",
            Format::Pdf => "pdf",
            Format::Image(ImageKind::Png) => "png",
            Format::Image(ImageKind::Jpeg) => "jpeg",
            Format::Unknown(s) if s.is_empty() => "unknown",
            Format::Unknown(s) => s,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Format {
    type Err = std::convert::Infallible;

    /// Accepts either an extension (`pdf`) or a MIME type (`application/pdf`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            Ok(Self::from_content_type(s))
        } else {
            Ok(Self::from_extension(s.trim_start_matches('.')))
        }
    }
}

/// Final status of an evaluated submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Accepted,
    Rejected,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Accepted => "accepted",
            VerdictStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerdictStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(VerdictStatus::Accepted),
            "rejected" => Ok(VerdictStatus::Rejected),
            other => anyhow::bail!("unknown verdict status: {}", other),
        }
    }
}

/// The prior submission a verdict points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestMatch {
    pub document_id: String,
    pub author_id: String,
}

/// Outcome attached to a submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub submission_id: String,
    pub fingerprint: Fingerprint,
    pub fingerprint_collision: bool,
    /// Best similarity score in `[0.0, 1.0]`.
    pub score: f64,
    pub best_match: Option<BestMatch>,
    pub status: VerdictStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Verdict {
    pub fn is_rejected(&self) -> bool {
        self.status == VerdictStatus::Rejected
    }
}

/// One prior submission as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub id: String,
    pub author_id: String,
    pub fingerprint: Fingerprint,
    /// `None` when extraction failed or produced too little text to score.
    pub normalized_text: Option<String>,
}

/// Everything the engine persists for one evaluated submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub author_id: String,
    pub scope_id: String,
    pub format: String,
    pub normalized_text: Option<String>,
    pub verdict: Verdict,
}

impl SubmissionRecord {
    pub fn id(&self) -> &str {
        &self.verdict.submission_id
    }

    pub fn to_corpus_entry(&self) -> CorpusEntry {
        CorpusEntry {
            id: self.verdict.submission_id.clone(),
            author_id: self.author_id.clone(),
            fingerprint: self.verdict.fingerprint.clone(),
            normalized_text: self.normalized_text.clone(),
        }
    }
}

/// Per-scope counts used by reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    pub scope_id: String,
    pub total: i64,
    pub accepted: i64,
    pub rejected: i64,
}

impl ScopeSummary {
    /// Rejected share in percent, 0 for an empty scope.
    pub fn rejection_rate(&self) -> i64 {
        if self.total > 0 {
            (self.rejected * 100) / self.total
        } else {
            0
        }
    }
}
