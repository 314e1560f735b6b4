//! Deterministic feature-hashing embeddings.
//!
//! Each lowercase word contributes a unigram feature and its boundary-padded
//! character trigrams (`#word#`) contribute lighter sub-word features. Every
//! feature is hashed with FNV-1a into a signed bucket, and the result is
//! L2-normalized. No model files, no network: identical text always yields an
//! identical vector, which keeps recovery and tests reproducible.

use anyhow::Result;

use super::{l2_normalize, EmbeddingProvider};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashedEmbeddingProvider {
    dimensions: usize,
    name: String,
}

impl HashedEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            name: "hashed/fnv1a-trigram".into(),
        }
    }

    fn add_feature(&self, vector: &mut [f32], kind: u8, feature: &str, weight: f32) {
        let mut hash = fnv1a_hash(&[kind, b':']);
        hash = fnv1a_extend(hash, feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        // high bit for the sign: the low bits already pick the bucket
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for raw in text.split(|c: char| !c.is_alphanumeric()) {
            if raw.is_empty() {
                continue;
            }
            let word = raw.to_lowercase();
            self.add_feature(&mut vector, b'w', &word, WORD_WEIGHT);

            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, b't', &trigram, TRIGRAM_WEIGHT);
            }
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a_hash(bytes: &[u8]) -> u64 {
    fnv1a_extend(FNV_OFFSET_BASIS, bytes)
}

fn fnv1a_extend(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
