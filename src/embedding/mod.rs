//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, the deterministic offline
//! [`hashed`] provider used by default, and OpenAI/Ollama-compatible
//! [`remote`] providers. Long content is split into overlapping chunks whose
//! vectors are mean-pooled; every vector leaving [`embed_content`] is checked
//! for the expected dimension, finite components, and a non-zero norm.

pub mod hashed;
pub mod remote;

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::config::EmbeddingConfig;
use crate::error::EngineError;

/// Rough characters-per-token ratio used to size chunks.
pub const CHARS_PER_TOKEN: usize = 4;

/// Trait for embedding text into vectors.
///
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched requests.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Stable identity (`provider/model`) recorded alongside stored vectors.
    fn name(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Supported: `hashed` (default, offline), `openai`, `ollama`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    anyhow::ensure!(
        config.dimensions > 0,
        "embedding.dimensions must be > 0"
    );
    match config.provider.as_str() {
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new(
            config.dimensions,
        ))),
        "openai" => Ok(Box::new(remote::RemoteEmbeddingProvider::openai(config)?)),
        "ollama" => Ok(Box::new(remote::RemoteEmbeddingProvider::ollama(config)?)),
        other => anyhow::bail!(
            "unknown embedding provider: {other}. Supported: hashed, openai, ollama"
        ),
    }
}

/// Chunking parameters for long content.
#[derive(Debug, Clone, Copy)]
pub struct Chunking {
    pub chunk_tokens: usize,
    pub overlap: f64,
}

impl Chunking {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            chunk_tokens: config.chunk_tokens.max(1),
            overlap: config.chunk_overlap.clamp(0.0, 0.5),
        }
    }
}

impl Default for Chunking {
    fn default() -> Self {
        Self {
            chunk_tokens: 768,
            overlap: 0.1,
        }
    }
}

/// Embed arbitrary-length content into one validated, L2-normalized vector.
///
/// Provider failures and malformed vectors become
/// [`EngineError::EmbeddingFailure`]. Nothing is retried here.
pub fn embed_content(
    provider: &dyn EmbeddingProvider,
    text: &str,
    chunking: Chunking,
) -> crate::error::Result<Vec<f32>> {
    let chunks = chunk_text(text, chunking.chunk_tokens, chunking.overlap);
    let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

    let vectors = provider
        .embed_batch(&refs)
        .map_err(|e| EngineError::EmbeddingFailure(format!("{e:#}")))?;
    if vectors.len() != refs.len() {
        return Err(EngineError::EmbeddingFailure(format!(
            "provider returned {} vectors for {} chunks",
            vectors.len(),
            refs.len()
        )));
    }
    for v in &vectors {
        validate(v, provider.dimensions()).map_err(EngineError::EmbeddingFailure)?;
    }

    if chunks.len() > 1 {
        tracing::debug!(chunks = chunks.len(), "mean-pooling chunk embeddings");
    }
    let pooled = mean_pool(&vectors);
    validate(&pooled, provider.dimensions()).map_err(EngineError::EmbeddingFailure)?;
    Ok(pooled)
}

/// Check dimension, finiteness, and non-zero norm.
pub fn validate(vector: &[f32], dimensions: usize) -> std::result::Result<(), String> {
    if vector.len() != dimensions {
        return Err(format!(
            "expected {dimensions} dimensions, got {}",
            vector.len()
        ));
    }
    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(format!("non-finite component at position {pos}"));
    }
    if l2_norm(vector) == 0.0 {
        return Err("zero-norm vector".into());
    }
    Ok(())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2-normalize a vector in place. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity in `[-1.0, 1.0]`. Zero for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}

/// Average vectors component-wise and re-normalize.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    if vectors.len() == 1 {
        return first.clone();
    }
    let mut sum = vec![0.0f32; first.len()];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    for x in &mut sum {
        *x /= n;
    }
    l2_normalize(&mut sum);
    sum
}

static BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n|[.!?]+\s+").expect("boundary pattern must compile"));

/// Split text into chunks of about `chunk_tokens` tokens.
///
/// Cuts prefer paragraph and sentence boundaries; a single sentence longer
/// than a chunk is split at character boundaries. Each chunk after the first
/// starts with the last `overlap` fraction of the previous one. Text that fits
/// in one chunk comes back unchanged.
pub fn chunk_text(text: &str, chunk_tokens: usize, overlap: f64) -> Vec<String> {
    let budget = chunk_tokens.max(1) * CHARS_PER_TOKEN;
    if text.chars().count() <= budget {
        return vec![text.to_string()];
    }
    let overlap_chars = (budget as f64 * overlap.clamp(0.0, 0.5)) as usize;

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in sentences(text) {
        for piece in split_chars(sentence, budget) {
            let piece_len = piece.chars().count();
            if current_len > 0 && current_len + piece_len > budget {
                let tail = tail_chars(&current, overlap_chars);
                let done = std::mem::take(&mut current);
                let trimmed = done.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
                current_len = tail.chars().count();
                current = tail;
            }
            current.push_str(piece);
            current_len += piece_len;
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    chunks
}

/// Sentences and paragraphs with their trailing delimiters attached.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in BOUNDARY.find_iter(text) {
        out.push(&text[start..m.end()]);
        start = m.end();
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn split_chars(s: &str, max_chars: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in s.char_indices() {
        if count == max_chars {
            out.push(&s[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

fn tail_chars(s: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let start = s
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl EmbeddingProvider for Fixed {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
        fn dimensions(&self) -> usize {
            3
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Failing;

    impl EmbeddingProvider for Failing {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }
        fn dimensions(&self) -> usize {
            3
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn normalize_and_cosine() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn validation_rejects_malformed_vectors() {
        assert!(validate(&[0.1, 0.2, 0.3], 3).is_ok());
        assert!(validate(&[0.1, 0.2], 3).is_err());
        assert!(validate(&[0.1, f32::NAN, 0.3], 3).is_err());
        assert!(validate(&[0.0, 0.0, 0.0], 3).is_err());
    }

    #[test]
    fn embed_content_maps_failures() {
        let err = embed_content(&Failing, "hello", Chunking::default()).unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingFailure(_)));
        assert!(err.to_string().contains("connection refused"));

        let err = embed_content(&Fixed(vec![0.0; 3]), "hello", Chunking::default()).unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingFailure(_)));

        let v = embed_content(&Fixed(vec![1.0, 0.0, 0.0]), "hello", Chunking::default()).unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("One sentence. Two sentences.", 768, 0.1);
        assert_eq!(chunks, vec!["One sentence. Two sentences."]);
    }

    #[test]
    fn long_text_splits_on_sentences_with_overlap() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(40);
        // 10 tokens -> 40 chars per chunk, 4 chars of overlap
        let chunks = chunk_text(&text, 10, 0.1);
        assert!(chunks.len() > 10);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40 + 4 + sentence.len());
        }
        assert!(chunks[0].starts_with("The quick brown fox"));
    }

    #[test]
    fn oversized_sentence_is_hard_split() {
        let text = "x".repeat(100);
        let chunks = chunk_text(&text, 5, 0.0);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.len() == 20));
    }

    #[test]
    fn mean_pool_averages_and_normalizes() {
        let pooled = mean_pool(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((pooled[0] - expected).abs() < 1e-6);
        assert!((pooled[1] - expected).abs() < 1e-6);
        assert!(mean_pool(&[]).is_empty());
    }

    #[test]
    fn create_provider_rejects_unknown() {
        let mut config = EmbeddingConfig::default();
        config.provider = "onnx".into();
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));

        config.provider = "hashed".into();
        config.dimensions = 0;
        assert!(create_provider(&config).is_err());
    }
}
