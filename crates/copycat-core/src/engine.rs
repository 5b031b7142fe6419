//! The decision engine.
//!
//! [`Engine::evaluate`] takes one submission through a single terminal pass:
//!
//! 1. **Quality**: normalized text shorter than `min_text_length` is
//!    rejected as unreadable. Nothing is compared.
//! 2. **Exact match**: a fingerprint equal to an earlier corpus entry is a
//!    duplicate (score 1.0).
//! 3. **Similarity**: the text is embedded under the scope's current
//!    [`ScopeSnapshot`] and scored against every corpus entry, through the
//!    index for entries the snapshot covers and pairwise for newer ones.
//! 4. **Corpus update**: the submission is recorded whatever the verdict,
//!    and the scope is refit once enough usable text has accumulated.
//!
//! Snapshots are immutable and shared as `Arc`s. A rebuild fits and indexes
//! on tokio's blocking pool, outside any lock, and is swapped in only if no
//! newer generation has been installed meanwhile, so readers never see a
//! half-built model.
//!
//! Scoring and recording are serialized per scope, so two submissions to
//! the same scope always see each other.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extract::Extractor;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::index::{similarity_from_distance, FlatIndex};
use crate::model::{
    apply_noise_floor, hybrid_similarity, pairwise_similarity, ModelParams, ModelState,
};
use crate::models::{BestMatch, CorpusEntry, Format, SubmissionRecord, Verdict, VerdictStatus};
use crate::normalize::{normalize, normalized_len};
use crate::repository::SubmissionRepository;

pub const REASON_LOW_QUALITY: &str = "low quality / unreadable";
pub const REASON_ORIGINAL: &str = "original work";

/// The only failure `evaluate` and `rebuild_index` surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("submission repository unavailable: {0:#}")]
    RepositoryUnavailable(anyhow::Error),
    /// The runtime shut down before a background rebuild could finish.
    #[error("rebuild interrupted: {0}")]
    Interrupted(String),
}

/// Verdict policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Scores strictly above this are rejected.
    pub rejection_threshold: f64,
    /// Minimum normalized length worth scoring.
    pub min_text_length: usize,
    /// Raw similarities below this count as 0.
    pub noise_floor: f64,
    /// Leave the submitting author's own earlier work out of the corpus.
    pub exclude_same_author: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            rejection_threshold: 0.3,
            min_text_length: 10,
            noise_floor: 0.05,
            exclude_same_author: true,
        }
    }
}

/// Identity of one indexed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub id: String,
    pub author_id: String,
}

/// Model, index and entry identities of one rebuild generation.
#[derive(Debug)]
pub struct ScopeSnapshot {
    pub scope_id: String,
    pub generation: u64,
    pub model: ModelState,
    pub index: FlatIndex,
    /// Index position `i` belongs to `entries[i]`.
    pub entries: Vec<SnapshotEntry>,
}

impl ScopeSnapshot {
    /// Fit and index every corpus entry that has usable text.
    pub fn build(
        scope_id: &str,
        generation: u64,
        corpus: &[CorpusEntry],
        params: &ModelParams,
    ) -> Self {
        let usable: Vec<(&CorpusEntry, &str)> = corpus
            .iter()
            .filter_map(|e| e.normalized_text.as_deref().map(|t| (e, t)))
            .collect();

        let texts: Vec<&str> = usable.iter().map(|(_, t)| *t).collect();
        let model = ModelState::fit(&texts, params);
        let index = FlatIndex::build(texts.iter().map(|t| model.embed(t)).collect());
        let entries = usable
            .iter()
            .map(|(e, _)| SnapshotEntry {
                id: e.id.clone(),
                author_id: e.author_id.clone(),
            })
            .collect();

        Self {
            scope_id: scope_id.to_string(),
            generation,
            model,
            index,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, thread-safe scoring engine. Wrap in an `Arc` to share.
pub struct Engine {
    repo: Arc<dyn SubmissionRepository>,
    extractor: Extractor,
    detection: DetectionParams,
    model: ModelParams,
    snapshots: RwLock<HashMap<String, Arc<ScopeSnapshot>>>,
    pending: Mutex<HashMap<String, usize>>,
    scope_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    next_generation: AtomicU64,
    rebuild_after_record: bool,
}

impl Engine {
    pub fn new(repo: Arc<dyn SubmissionRepository>, extractor: Extractor) -> Self {
        Self {
            repo,
            extractor,
            detection: DetectionParams::default(),
            model: ModelParams::default(),
            snapshots: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            scope_locks: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            rebuild_after_record: true,
        }
    }

    pub fn with_detection(mut self, detection: DetectionParams) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_model(mut self, model: ModelParams) -> Self {
        self.model = model;
        self
    }

    /// Whether `evaluate` refits the scope once `rebuild_every` usable
    /// submissions have accumulated. On by default; a process that exits
    /// after one submission turns it off, since the next process fits
    /// the corpus from scratch on first use anyway.
    pub fn with_rebuild_after_record(mut self, enabled: bool) -> Self {
        self.rebuild_after_record = enabled;
        self
    }

    pub fn detection(&self) -> &DetectionParams {
        &self.detection
    }

    /// Extract and normalize a payload the way `evaluate` does.
    pub async fn normalized_text(&self, bytes: &[u8], format: &Format) -> String {
        normalize(&self.extractor.extract_or_empty(bytes, format).await)
    }

    /// The installed snapshot for `scope_id`, if one has been built.
    pub fn current_snapshot(&self, scope_id: &str) -> Option<Arc<ScopeSnapshot>> {
        self.snapshots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(scope_id)
            .cloned()
    }

    /// Score one submission and record it.
    pub async fn evaluate(
        &self,
        bytes: &[u8],
        format: &Format,
        author_id: &str,
        scope_id: &str,
    ) -> Result<Verdict, EngineError> {
        let submission_id = uuid::Uuid::new_v4().to_string();
        let fp = fingerprint(bytes);
        let text = self.normalized_text(bytes, format).await;
        debug!(
            submission = %submission_id,
            format = %format,
            chars = normalized_len(&text),
            "extracted submission"
        );

        let scope_lock = self.scope_lock(scope_id);
        let guard = scope_lock.lock().await;

        let (verdict, normalized_text) = if normalized_len(&text) < self.detection.min_text_length
        {
            let verdict = Verdict {
                submission_id,
                fingerprint: fp,
                fingerprint_collision: false,
                score: 0.0,
                best_match: None,
                status: VerdictStatus::Rejected,
                reason: REASON_LOW_QUALITY.to_string(),
                created_at: Utc::now(),
            };
            (verdict, None)
        } else {
            let verdict = self
                .score(submission_id, fp, &text, author_id, scope_id)
                .await?;
            (verdict, Some(text))
        };

        info!(
            submission = %verdict.submission_id,
            author = author_id,
            scope = scope_id,
            status = %verdict.status,
            score = verdict.score,
            reason = %verdict.reason,
            "verdict"
        );

        let usable = normalized_text.is_some();
        let record = SubmissionRecord {
            author_id: author_id.to_string(),
            scope_id: scope_id.to_string(),
            format: format.label().to_string(),
            normalized_text,
            verdict,
        };
        self.repo
            .record(&record)
            .await
            .map_err(EngineError::RepositoryUnavailable)?;
        drop(guard);

        if usable && self.rebuild_after_record && self.mark_pending(scope_id) {
            if let Err(e) = self.rebuild_index(scope_id).await {
                warn!(scope = scope_id, error = %e, "rebuild after submission failed");
            }
        }

        Ok(record.verdict)
    }

    /// Fit and index the scope's full corpus, then install it.
    ///
    /// Returns the snapshot installed afterwards, which is a newer one if a
    /// concurrent rebuild finished first.
    pub async fn rebuild_index(&self, scope_id: &str) -> Result<Arc<ScopeSnapshot>, EngineError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let corpus = self
            .repo
            .list_corpus(scope_id, None)
            .await
            .map_err(EngineError::RepositoryUnavailable)?;

        let scope = scope_id.to_string();
        let params = self.model;
        let built = tokio::task::spawn_blocking(move || {
            ScopeSnapshot::build(&scope, generation, &corpus, &params)
        })
        .await;
        let built = match built {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(EngineError::Interrupted(e.to_string())),
        };

        Ok(self.install(built))
    }

    /// Install `built` unless a newer generation is already in place.
    /// Returns whichever snapshot is installed afterwards.
    fn install(&self, built: Arc<ScopeSnapshot>) -> Arc<ScopeSnapshot> {
        let mut snapshots = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
        match snapshots.get(&built.scope_id) {
            Some(current) if current.generation > built.generation => {
                debug!(
                    scope = %built.scope_id,
                    generation = built.generation,
                    installed = current.generation,
                    "discarding superseded rebuild"
                );
                Arc::clone(current)
            }
            _ => {
                info!(
                    scope = %built.scope_id,
                    generation = built.generation,
                    documents = built.len(),
                    vocabulary = built.model.dimension(),
                    "installed scope snapshot"
                );
                snapshots.insert(built.scope_id.clone(), Arc::clone(&built));
                built
            }
        }
    }

    /// Similarity of two raw texts under the scope's current model.
    pub async fn compare(&self, scope_id: &str, a: &str, b: &str) -> Result<f64, EngineError> {
        let snapshot = match self.current_snapshot(scope_id) {
            Some(s) => s,
            None => self.rebuild_index(scope_id).await?,
        };
        Ok(hybrid_similarity(
            &snapshot.model,
            &normalize(a),
            &normalize(b),
            self.detection.noise_floor,
        ))
    }

    async fn score(
        &self,
        submission_id: String,
        fp: Fingerprint,
        text: &str,
        author_id: &str,
        scope_id: &str,
    ) -> Result<Verdict, EngineError> {
        let exclude = self.detection.exclude_same_author.then_some(author_id);
        let corpus = self
            .repo
            .list_corpus(scope_id, exclude)
            .await
            .map_err(EngineError::RepositoryUnavailable)?;

        if let Some(dup) = corpus.iter().find(|e| e.fingerprint == fp) {
            return Ok(Verdict {
                submission_id,
                fingerprint: fp,
                fingerprint_collision: true,
                score: 1.0,
                best_match: Some(BestMatch {
                    document_id: dup.id.clone(),
                    author_id: dup.author_id.clone(),
                }),
                status: VerdictStatus::Rejected,
                reason: format!("exact duplicate of {}", dup.author_id),
                created_at: Utc::now(),
            });
        }

        let snapshot = self.snapshot_for(scope_id, &corpus).await?;
        let best = self.best_match(&snapshot, text, &corpus);

        let (score, best_match) = match best {
            Some((score, pos)) => (
                score,
                Some(BestMatch {
                    document_id: corpus[pos].id.clone(),
                    author_id: corpus[pos].author_id.clone(),
                }),
            ),
            None => (0.0, None),
        };

        let (status, reason) = match &best_match {
            Some(m) if score > self.detection.rejection_threshold => (
                VerdictStatus::Rejected,
                format!(
                    "high similarity with {} ({:.0}%)",
                    m.author_id,
                    score * 100.0
                ),
            ),
            _ => (VerdictStatus::Accepted, REASON_ORIGINAL.to_string()),
        };

        Ok(Verdict {
            submission_id,
            fingerprint: fp,
            fingerprint_collision: false,
            score,
            best_match,
            status,
            reason,
            created_at: Utc::now(),
        })
    }

    /// The installed snapshot, built now if the scope has none or if it was
    /// fit over no usable text while the corpus has some.
    async fn snapshot_for(
        &self,
        scope_id: &str,
        corpus: &[CorpusEntry],
    ) -> Result<Arc<ScopeSnapshot>, EngineError> {
        match self.current_snapshot(scope_id) {
            Some(s) if !s.model.is_empty() => Ok(s),
            Some(s) => {
                let known: HashSet<&str> = s.entries.iter().map(|e| e.id.as_str()).collect();
                let has_new_text = corpus
                    .iter()
                    .any(|e| e.normalized_text.is_some() && !known.contains(e.id.as_str()));
                if has_new_text {
                    self.rebuild_index(scope_id).await
                } else {
                    Ok(s)
                }
            }
            None => self.rebuild_index(scope_id).await,
        }
    }

    /// Highest-scoring corpus entry as `(score, corpus position)`.
    ///
    /// Ties go to the earliest entry. Scores under the noise floor count as
    /// no match.
    fn best_match(
        &self,
        snapshot: &ScopeSnapshot,
        text: &str,
        corpus: &[CorpusEntry],
    ) -> Option<(f64, usize)> {
        if snapshot.model.is_empty() || corpus.is_empty() {
            return None;
        }

        let positions: HashMap<&str, usize> = corpus
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.as_str(), i))
            .collect();

        let query = snapshot.model.embed(text);
        let mut best: Option<(f64, usize)> = None;
        let mut consider = |score: f64, pos: usize| match best {
            Some((s, p)) if s > score || (s == score && p < pos) => {}
            _ => best = Some((score, pos)),
        };

        for n in snapshot.index.query(&query, snapshot.index.len()) {
            let entry = &snapshot.entries[n.position];
            if let Some(&pos) = positions.get(entry.id.as_str()) {
                consider(similarity_from_distance(n.distance), pos);
            }
        }

        // Entries recorded since the snapshot was built are outside its
        // vocabulary, so each is scored under a fit of its own pair.
        let indexed: HashSet<&str> = snapshot.entries.iter().map(|e| e.id.as_str()).collect();
        for (pos, entry) in corpus.iter().enumerate() {
            if indexed.contains(entry.id.as_str()) {
                continue;
            }
            if let Some(other) = entry.normalized_text.as_deref() {
                consider(pairwise_similarity(text, other, &self.model), pos);
            }
        }

        best.map(|(s, p)| (apply_noise_floor(s, self.detection.noise_floor), p))
            .filter(|(s, _)| *s > 0.0)
    }

    fn scope_lock(&self, scope_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.scope_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(scope_id.to_string()).or_default())
    }

    /// Count one usable submission; true when a rebuild is due.
    fn mark_pending(&self, scope_id: &str) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let count = pending.entry(scope_id.to_string()).or_insert(0);
        *count += 1;
        if *count >= self.model.rebuild_every.max(1) {
            *count = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{pdf_with_pages, png_bytes, SlowOcr, StubOcr};
    use crate::models::ImageKind;
    use crate::repository::InMemoryRepository;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn engine(repo: Arc<InMemoryRepository>) -> Engine {
        Engine::new(repo, Extractor::default())
    }

    async fn submit(engine: &Engine, text: &str, author: &str, scope: &str) -> Verdict {
        engine
            .evaluate(text.as_bytes(), &Format::PlainText, author, scope)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_quick_brown_fox_end_to_end() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo.clone());

        let first = submit(&engine, "The quick brown fox", "alice", "s").await;
        assert_eq!(first.status, VerdictStatus::Accepted);
        assert_eq!(first.score, 0.0);
        assert_eq!(first.reason, "original work");

        let second = submit(&engine, "The quick brown fox", "bob", "s").await;
        assert_eq!(second.status, VerdictStatus::Rejected);
        assert_eq!(second.score, 1.0);
        assert!(second.fingerprint_collision);
        assert!(second.reason.contains("alice"), "{}", second.reason);
        assert_eq!(second.best_match.unwrap().document_id, first.submission_id);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_cites_first_author() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        submit(&engine, "an essay about rivers and lakes", "alice", "s").await;
        submit(&engine, "an essay about rivers and lakes", "bob", "s").await;
        let third = submit(&engine, "an essay about rivers and lakes", "carol", "s").await;
        assert_eq!(third.reason, "exact duplicate of alice");
    }

    #[tokio::test]
    async fn test_low_quality_always_rejected() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo.clone());

        let a = submit(&engine, "Hi there!", "alice", "s").await;
        assert_eq!(a.status, VerdictStatus::Rejected);
        assert_eq!(a.reason, REASON_LOW_QUALITY);

        // Same bytes from another author are still a quality rejection.
        let b = submit(&engine, "Hi there!", "bob", "s").await;
        assert_eq!(b.reason, REASON_LOW_QUALITY);
        assert!(!b.fingerprint_collision);

        let stored = repo.get_submission(&b.submission_id).await.unwrap().unwrap();
        assert!(stored.normalized_text.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_formats_are_low_quality() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        let v = engine
            .evaluate(b"%PDF-garbage", &Format::Pdf, "alice", "s")
            .await
            .unwrap();
        assert_eq!(v.reason, REASON_LOW_QUALITY);

        let png = png_bytes(4, 4);
        let v = engine
            .evaluate(&png, &Format::Image(ImageKind::Png), "alice", "s")
            .await
            .unwrap();
        assert_eq!(v.reason, REASON_LOW_QUALITY);
    }

    #[tokio::test]
    async fn test_near_duplicate_rejected() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        let a = submit(&engine, "machine learning is fun", "alice", "s").await;
        submit(&engine, "deep learning is great", "bob", "s").await;

        let c = submit(&engine, "Machine learning is FUN!", "carol", "s").await;
        assert!(!c.fingerprint_collision);
        assert_eq!(c.status, VerdictStatus::Rejected);
        assert!((c.score - 1.0).abs() < 1e-6);
        assert_eq!(c.best_match.unwrap().document_id, a.submission_id);
        assert!(c.reason.starts_with("high similarity with alice"), "{}", c.reason);
        assert!(c.reason.ends_with("(100%)"), "{}", c.reason);

        let to_first = engine
            .compare("s", "Machine learning is FUN!", "machine learning is fun")
            .await
            .unwrap();
        let to_second = engine
            .compare("s", "Machine learning is FUN!", "deep learning is great")
            .await
            .unwrap();
        assert!(to_first > to_second);
    }

    #[tokio::test]
    async fn test_pdf_matches_plain_text() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        submit(&engine, "photosynthesis converts sunlight into chemical energy", "alice", "s").await;

        let pdf = pdf_with_pages(&["Photosynthesis converts sunlight", "into chemical energy"]);
        let v = engine
            .evaluate(&pdf, &Format::Pdf, "bob", "s")
            .await
            .unwrap();
        assert_eq!(v.status, VerdictStatus::Rejected);
        assert!(v.reason.contains("alice"));
    }

    #[tokio::test]
    async fn test_ocr_text_is_scored() {
        let repo = Arc::new(InMemoryRepository::new());
        let ocr = Arc::new(StubOcr(Ok("Volcanoes erupt molten rock called magma".into())));
        let engine = Engine::new(repo, Extractor::default().with_ocr(ocr));
        submit(&engine, "volcanoes erupt molten rock called magma", "alice", "s").await;

        let png = png_bytes(16, 16);
        let v = engine
            .evaluate(&png, &Format::Image(ImageKind::Png), "bob", "s")
            .await
            .unwrap();
        assert_eq!(v.status, VerdictStatus::Rejected);
        assert!(!v.fingerprint_collision);
    }

    #[tokio::test]
    async fn test_original_work_accepted_with_score() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        submit(
            &engine,
            "rust ownership borrowing lifetimes traits generics closures iterators \
             macros modules crates cargo enums structs patterns matching",
            "alice",
            "s",
        )
        .await;
        let v = submit(
            &engine,
            "gardening tomatoes requires sunlight water compost patience ownership",
            "bob",
            "s",
        )
        .await;
        assert_eq!(v.status, VerdictStatus::Accepted);
        assert_eq!(v.reason, REASON_ORIGINAL);
        assert!(v.score > 0.0 && v.score <= 0.3, "score {}", v.score);
        assert!(v.best_match.is_some());
    }

    #[tokio::test]
    async fn test_same_author_excluded_by_default() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        submit(&engine, "my own essay about volcanoes", "alice", "s").await;
        let again = submit(&engine, "my own essay about volcanoes", "alice", "s").await;
        assert_eq!(again.status, VerdictStatus::Accepted);
        assert_eq!(again.score, 0.0);
        assert!(again.best_match.is_none());
    }

    #[tokio::test]
    async fn test_same_author_included_when_configured() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo).with_detection(DetectionParams {
            exclude_same_author: false,
            ..Default::default()
        });
        submit(&engine, "my own essay about volcanoes", "alice", "s").await;
        let again = submit(&engine, "my own essay about volcanoes", "alice", "s").await;
        assert!(again.fingerprint_collision);
        assert_eq!(again.reason, "exact duplicate of alice");
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        submit(&engine, "the water cycle and evaporation", "alice", "bio-101").await;
        let v = submit(&engine, "the water cycle and evaporation", "bob", "chem-201").await;
        assert_eq!(v.status, VerdictStatus::Accepted);
        assert_eq!(v.score, 0.0);
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo).with_detection(DetectionParams {
            rejection_threshold: 1.0,
            ..Default::default()
        });
        submit(&engine, "machine learning is fun", "alice", "s").await;
        let v = submit(&engine, "Machine learning is fun.", "bob", "s").await;
        assert_eq!(v.status, VerdictStatus::Accepted);
        assert!(v.score > 0.99);
    }

    #[tokio::test]
    async fn test_rebuild_every_batches_refits() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo).with_model(ModelParams {
            rebuild_every: 3,
            ..Default::default()
        });

        submit(&engine, "machine learning is fun and rewarding", "alice", "s").await;
        let first_gen = engine.current_snapshot("s").unwrap().generation;

        // The empty snapshot is refit eagerly once text exists.
        submit(&engine, "deep learning is great", "bob", "s").await;
        let snap = engine.current_snapshot("s").unwrap();
        assert!(snap.generation > first_gen);
        assert_eq!(snap.len(), 1);

        // Bob's entry is not indexed yet but is still compared pairwise.
        let v = submit(&engine, "Deep learning is great!", "carol", "s").await;
        assert_eq!(v.status, VerdictStatus::Rejected);
        assert!(v.reason.contains("bob"), "{}", v.reason);

        // Third usable submission triggers the batched refit.
        let snap = engine.current_snapshot("s").unwrap();
        assert_eq!(snap.len(), 3);
    }

    #[tokio::test]
    async fn test_unindexed_entries_not_collapsed_onto_stale_vocabulary() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo).with_model(ModelParams {
            rebuild_every: 3,
            ..Default::default()
        });

        submit(
            &engine,
            "machine learning rewards patience curiosity statistics algebra calculus \
             probability optimization gradients datasets models evaluation benchmarks research",
            "alice",
            "s",
        )
        .await;
        // Indexes Alice only; Bob stays outside the snapshot.
        submit(&engine, "learning pottery wheel techniques with clay", "bob", "s").await;
        assert_eq!(engine.current_snapshot("s").unwrap().len(), 1);

        // Bob and Carol share only "learning", the one term Alice's vocabulary knows.
        let carol = submit(&engine, "learning violin scales arpeggios practice", "carol", "s").await;
        assert_eq!(carol.status, VerdictStatus::Accepted, "{}", carol.reason);
        assert!(carol.score < 0.3, "score {}", carol.score);
        assert_ne!(carol.best_match.unwrap().author_id, "bob");
    }

    #[tokio::test]
    async fn test_slow_ocr_does_not_stall_runtime() {
        let repo = Arc::new(InMemoryRepository::new());
        let ocr = Arc::new(SlowOcr(Duration::from_millis(200)));
        let engine = Engine::new(repo, Extractor::default().with_ocr(ocr));

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let png = png_bytes(8, 8);
        let v = engine
            .evaluate(&png, &Format::Image(ImageKind::Png), "alice", "s")
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(v.status, VerdictStatus::Accepted);
        assert!(ticks.load(Ordering::SeqCst) >= 5, "ticker starved");
    }

    #[tokio::test]
    async fn test_older_generation_never_replaces_newer() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        let params = ModelParams::default();

        let newer = Arc::new(ScopeSnapshot::build("s", 7, &[], &params));
        let older = Arc::new(ScopeSnapshot::build("s", 6, &[], &params));
        assert_eq!(engine.install(newer).generation, 7);
        assert_eq!(engine.install(older).generation, 7);
        assert_eq!(engine.current_snapshot("s").unwrap().generation, 7);

        // A rebuild that started before a far newer install is discarded too.
        let far = Arc::new(ScopeSnapshot::build("s", u64::MAX, &[], &params));
        engine.install(far);
        let kept = engine.rebuild_index("s").await.unwrap();
        assert_eq!(kept.generation, u64::MAX);
        assert_eq!(engine.current_snapshot("s").unwrap().generation, u64::MAX);
    }

    #[tokio::test]
    async fn test_rebuild_after_record_can_be_disabled() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo).with_rebuild_after_record(false);

        submit(&engine, "kinetic energy and momentum", "alice", "s").await;
        submit(&engine, "thermodynamics and entropy", "bob", "s").await;

        // Only the on-demand fit for Bob's scoring ran; Bob is not indexed.
        let snap = engine.current_snapshot("s").unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.entries[0].author_id, "alice");
    }

    struct SlowRepository(InMemoryRepository);

    #[async_trait]
    impl SubmissionRepository for SlowRepository {
        async fn list_corpus(
            &self,
            scope_id: &str,
            exclude_author: Option<&str>,
        ) -> anyhow::Result<Vec<CorpusEntry>> {
            let corpus = self.0.list_corpus(scope_id, exclude_author).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            corpus
        }
        async fn record(&self, record: &SubmissionRecord) -> anyhow::Result<()> {
            self.0.record(record).await
        }
        async fn get_submission(&self, id: &str) -> anyhow::Result<Option<SubmissionRecord>> {
            self.0.get_submission(id).await
        }
        async fn scope_summary(&self, scope_id: &str) -> anyhow::Result<crate::models::ScopeSummary> {
            self.0.scope_summary(scope_id).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_identical_submissions_see_each_other() {
        let repo = Arc::new(SlowRepository(InMemoryRepository::new()));
        let engine = Engine::new(repo, Extractor::default());
        let bytes = b"an essay about glaciers and erosion";

        let (a, b) = tokio::join!(
            engine.evaluate(bytes, &Format::PlainText, "alice", "s"),
            engine.evaluate(bytes, &Format::PlainText, "bob", "s"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.status, VerdictStatus::Accepted);
        assert_eq!(b.status, VerdictStatus::Rejected);
        assert_eq!(b.score, 1.0);
        assert_eq!(b.reason, "exact duplicate of alice");
    }

    #[tokio::test]
    async fn test_rebuild_index_generations_increase() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        let a = engine.rebuild_index("s").await.unwrap();
        assert!(a.model.is_empty());
        submit(&engine, "kinetic energy and momentum", "alice", "s").await;
        let b = engine.rebuild_index("s").await.unwrap();
        assert!(b.generation > a.generation);
        assert_eq!(b.len(), 1);
        assert_eq!(
            engine.current_snapshot("s").unwrap().generation,
            b.generation
        );
    }

    #[tokio::test]
    async fn test_rebuild_keeps_existing_best_match_order() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        submit(&engine, "plate tectonics moves continents slowly", "alice", "s").await;
        submit(&engine, "volcanoes form along plate boundaries", "bob", "s").await;

        let q = "plate tectonics and volcanoes";
        let before_a = engine.compare("s", q, "plate tectonics moves continents slowly").await.unwrap();
        let before_b = engine.compare("s", q, "volcanoes form along plate boundaries").await.unwrap();

        submit(&engine, "baking bread needs flour yeast water", "carol", "s").await;
        engine.rebuild_index("s").await.unwrap();

        let after_a = engine.compare("s", q, "plate tectonics moves continents slowly").await.unwrap();
        let after_b = engine.compare("s", q, "volcanoes form along plate boundaries").await.unwrap();
        assert_eq!(before_a > before_b, after_a > after_b);
    }

    #[tokio::test]
    async fn test_compare_empty_scope_is_zero() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = engine(repo);
        let s = engine
            .compare("empty", "machine learning is fun", "machine learning is fun")
            .await
            .unwrap();
        assert_eq!(s, 0.0);
    }

    struct FailingRepository;

    #[async_trait]
    impl SubmissionRepository for FailingRepository {
        async fn list_corpus(
            &self,
            _scope_id: &str,
            _exclude_author: Option<&str>,
        ) -> anyhow::Result<Vec<CorpusEntry>> {
            anyhow::bail!("database is locked")
        }
        async fn record(&self, _record: &SubmissionRecord) -> anyhow::Result<()> {
            anyhow::bail!("database is locked")
        }
        async fn get_submission(&self, _id: &str) -> anyhow::Result<Option<SubmissionRecord>> {
            Ok(None)
        }
        async fn scope_summary(&self, scope_id: &str) -> anyhow::Result<crate::models::ScopeSummary> {
            Ok(crate::models::ScopeSummary {
                scope_id: scope_id.to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let engine = Engine::new(Arc::new(FailingRepository), Extractor::default());
        let err = engine
            .evaluate(b"a perfectly readable essay", &Format::PlainText, "a", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RepositoryUnavailable(_)));
        assert!(err.to_string().contains("database is locked"));

        let err = engine
            .evaluate(b"short", &Format::PlainText, "a", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RepositoryUnavailable(_)));
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
