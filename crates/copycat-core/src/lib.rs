//! # Copycat Core
//!
//! The duplicate-submission detection engine: fingerprinting, text
//! extraction, normalization, TF-IDF vectorization, a flat similarity
//! index, and the decision engine that turns those signals into a
//! [`models::Verdict`].
//!
//! This crate contains no sqlx or process spawning, and uses tokio only to
//! move PDF parsing and model fitting onto the blocking pool. Storage is
//! reached through the [`repository::SubmissionRepository`] trait and OCR
//! through the [`extract::OcrEngine`] trait; the `copycat` app crate
//! supplies the SQLite and tesseract implementations.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──▶ fingerprint ─────────────────────────────┐
//!   │                                                 ▼
//!   └──▶ extract ──▶ normalize ──▶ model.embed ──▶ index.query ──▶ engine ──▶ Verdict
//! ```

pub mod engine;
pub mod extract;
pub mod fingerprint;
pub mod index;
pub mod model;
pub mod models;
pub mod normalize;
pub mod repository;
mod stopwords;

pub use engine::{DetectionParams, Engine, EngineError, ScopeSnapshot};
pub use extract::{ExtractionFailure, ExtractionLimits, Extractor, OcrEngine};
pub use fingerprint::{fingerprint, Fingerprint};
pub use index::{FlatIndex, Neighbor};
pub use model::{hybrid_similarity, pairwise_similarity, ModelParams, ModelState};
pub use models::{
    BestMatch, CorpusEntry, Format, ImageKind, ScopeSummary, SubmissionRecord, Verdict,
    VerdictStatus,
};
pub use normalize::normalize;
pub use repository::{InMemoryRepository, SubmissionRepository};
