//! Embedding provider trait, the hashing TF-IDF embedder, and vector utilities.
//!
//! The [`HashingEmbedder`] maps text into a fixed 256-slot vector without any
//! model or vocabulary:
//!
//! 1. **Character pass**: every character of the lowercased text adds `1`
//!    to slot `code_point mod 256`.
//! 2. **Token pass**: every token occurrence adds its weight to the slot of
//!    each of its characters. The weight is the token's term frequency, or
//!    `tf × ln(N / df)` when [`CorpusStats`] for a sibling batch are given.
//! 3. **Normalize**: divide by the Euclidean norm (zero vectors stay zero).
//!
//! The output is a pure function of the text and the corpus statistics.

use std::collections::{HashMap, HashSet};

use crate::tokenize::tokenize;

/// Width of every vector produced by [`HashingEmbedder`].
pub const VECTOR_DIMS: usize = 256;

/// Added to the norm product in [`cosine_similarity`] so all-zero vectors
/// score `0.0` instead of dividing by zero.
pub const SIMILARITY_EPSILON: f64 = 1e-10;

/// Document-frequency statistics over a batch of sibling chunks.
///
/// Build once per document with [`CorpusStats::from_texts`] and pass to
/// every [`EmbeddingProvider::embed`] call for that document's chunks.
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    docs: usize,
    doc_freq: HashMap<String, usize>,
}

impl CorpusStats {
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            let unique: HashSet<String> = tokenize(text.as_ref()).into_iter().collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
        Self {
            docs: texts.len(),
            doc_freq,
        }
    }

    /// Number of texts in the batch.
    pub fn len(&self) -> usize {
        self.docs
    }

    pub fn is_empty(&self) -> bool {
        self.docs == 0
    }

    /// Number of batch texts containing `token`.
    pub fn doc_freq(&self, token: &str) -> usize {
        self.doc_freq.get(token).copied().unwrap_or(0)
    }

    /// Natural-log inverse document frequency, with `df` floored at 1.
    pub fn idf(&self, token: &str) -> f64 {
        let df = self.doc_freq(token).max(1);
        (self.docs as f64 / df as f64).ln()
    }
}

/// Trait for embedding providers.
///
/// Embedding never fails: malformed or empty input degrades to the zero
/// vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed one text, optionally weighted by sibling statistics.
    fn embed(&self, text: &str, corpus: Option<&CorpusStats>) -> Vec<f32>;

    /// Embed a batch that is its own sibling corpus.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        let stats = CorpusStats::from_texts(texts);
        texts.iter().map(|t| self.embed(t, Some(&stats))).collect()
    }
}

/// The character-hashing TF-IDF embedder.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder;

impl EmbeddingProvider for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hash-tfidf-256"
    }

    fn dims(&self) -> usize {
        VECTOR_DIMS
    }

    fn embed(&self, text: &str, corpus: Option<&CorpusStats>) -> Vec<f32> {
        embed_text(text, corpus)
    }
}

/// Embed `text` with [`HashingEmbedder`] semantics.
pub fn embed_text(text: &str, corpus: Option<&CorpusStats>) -> Vec<f32> {
    let mut slots = [0.0f64; VECTOR_DIMS];
    let lowered = text.to_lowercase();

    for c in lowered.chars() {
        slots[slot(c)] += 1.0;
    }

    let tokens = tokenize(&lowered);
    let mut tf: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *tf.entry(token.as_str()).or_insert(0) += 1;
    }

    let corpus = corpus.filter(|c| !c.is_empty());
    for token in &tokens {
        let freq = tf[token.as_str()] as f64;
        let weight = match corpus {
            Some(stats) => freq * stats.idf(token),
            None => freq,
        };
        for c in token.chars() {
            slots[slot(c)] += weight;
        }
    }

    let norm = slots.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vec![0.0; VECTOR_DIMS];
    }
    slots.iter().map(|x| (x / norm) as f32).collect()
}

fn slot(c: char) -> usize {
    (c as u32 % VECTOR_DIMS as u32) as usize
}

/// Compute cosine similarity between two embedding vectors.
///
/// ```text
///               a · b
/// cos(θ) = ───────────────
///          ‖a‖ × ‖b‖ + ε
/// ```
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt() + SIMILARITY_EPSILON)) as f32
}
