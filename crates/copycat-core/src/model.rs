//! TF-IDF vector model.
//!
//! [`ModelState::fit`] learns a bounded vocabulary and smoothed IDF weights
//! from a scope's normalized texts. [`ModelState::embed`] projects any text
//! into that vocabulary as an L2-normalized vector. The model is derived
//! data: it is refit from the authoritative corpus texts, never updated in
//! place.
//!
//! Terms that appear after a fit contribute zero weight until the next
//! refit.

use std::collections::{HashMap, HashSet};

use crate::stopwords::is_stop_word;

/// Tunables for [`ModelState::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelParams {
    /// Upper bound on vocabulary size.
    pub max_features: usize,
    /// Usable submissions per scope between automatic refits.
    pub rebuild_every: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            max_features: 5000,
            rebuild_every: 1,
        }
    }
}

/// A fitted vocabulary with IDF weights. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ModelState {
    /// Terms in lexicographic (column) order.
    vocabulary: Vec<String>,
    columns: HashMap<String, usize>,
    idf: Vec<f32>,
    documents: usize,
}

/// Split normalized text into scoring tokens.
///
/// Tokens shorter than two characters and stop words are dropped.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .filter(|t| t.len() >= 2 && !is_stop_word(t))
}

impl ModelState {
    /// Fit over `texts`. An empty or all-stop-word corpus gives an empty model.
    pub fn fit<S: AsRef<str>>(texts: &[S], params: &ModelParams) -> Self {
        let mut term_freq: HashMap<&str, u64> = HashMap::new();
        let mut doc_freq: HashMap<&str, u64> = HashMap::new();

        for text in texts {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokenize(text.as_ref()) {
                *term_freq.entry(token).or_insert(0) += 1;
                if seen.insert(token) {
                    *doc_freq.entry(token).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, u64)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(params.max_features);

        let mut vocabulary: Vec<String> = ranked.iter().map(|(t, _)| t.to_string()).collect();
        vocabulary.sort();

        let n = texts.len() as f64;
        let idf: Vec<f32> = vocabulary
            .iter()
            .map(|t| {
                let df = doc_freq.get(t.as_str()).copied().unwrap_or(0) as f64;
                (((1.0 + n) / (1.0 + df)).ln() + 1.0) as f32
            })
            .collect();

        let columns = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Self {
            vocabulary,
            columns,
            idf,
            documents: texts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    /// Number of texts the model was fit over.
    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Embed normalized `text` as an L2-normalized TF-IDF vector.
    ///
    /// Text with no in-vocabulary terms yields the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.vocabulary.len()];
        if v.is_empty() {
            return v;
        }

        for token in tokenize(text) {
            if let Some(&col) = self.columns.get(token) {
                v[col] += 1.0;
            }
        }
        for (x, w) in v.iter_mut().zip(self.idf.iter()) {
            *x *= w;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

/// Cosine similarity, 0 when either vector has zero norm or dimensions differ.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb).sqrt()
}

/// Pairwise similarity of two normalized texts under `model`.
///
/// Scores below `noise_floor` are clamped to 0; the result lies in `[0, 1]`.
pub fn hybrid_similarity(model: &ModelState, a: &str, b: &str, noise_floor: f64) -> f64 {
    if model.is_empty() || a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let score = cosine(&model.embed(a), &model.embed(b));
    apply_noise_floor(score, noise_floor)
}

/// Raw cosine of two normalized texts under a model fit over just the pair.
///
/// Used for documents a scope snapshot does not cover yet: embedding both
/// under an older vocabulary would keep only the terms it happens to know.
pub fn pairwise_similarity(a: &str, b: &str, params: &ModelParams) -> f64 {
    let model = ModelState::fit(&[a, b], params);
    if model.is_empty() {
        return 0.0;
    }
    cosine(&model.embed(a), &model.embed(b))
}

pub(crate) fn apply_noise_floor(score: f64, noise_floor: f64) -> f64 {
    if !score.is_finite() || score < noise_floor {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
