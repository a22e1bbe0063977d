//! Hashed term-weight encoder for keyword matching
//!
//! Terms are lowercased Unicode words. Each term hashes into a fixed bucket
//! space and is weighted `1 + ln(tf)`; the vector is L2-normalized so the dot
//! product of two encodings lies in `[0, 1]`.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

use super::embedding::SparseVector;

/// Stateless sparse encoder
#[derive(Debug, Clone)]
pub struct TermWeightEncoder {
    buckets: u32,
}

impl TermWeightEncoder {
    pub fn new(buckets: u32) -> Self {
        Self { buckets: buckets.max(1) }
    }

    /// Encode text into a normalized sparse vector
    pub fn encode(&self, text: &str) -> Result<SparseVector> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for word in text.unicode_words() {
            *counts.entry(word.to_lowercase()).or_insert(0) += 1;
        }

        if counts.is_empty() {
            return Err(Error::encoding("Text has no terms to encode"));
        }

        let mut vector = SparseVector::from_pairs(
            counts
                .iter()
                .map(|(term, tf)| (self.bucket(term), 1.0 + (*tf as f32).ln())),
        );

        let norm = vector.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector.values {
                *value /= norm;
            }
        }

        Ok(vector)
    }

    fn bucket(&self, term: &str) -> u32 {
        let digest = Sha256::digest(term.as_bytes());
        let raw = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        raw % self.buckets
    }
}

impl Default for TermWeightEncoder {
    fn default() -> Self {
        Self::new(1 << 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_rejected() {
        let encoder = TermWeightEncoder::default();
        assert!(matches!(encoder.encode("   \n\t"), Err(Error::Encoding(_))));
        assert!(matches!(encoder.encode("!!! ..."), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_encoding_is_case_insensitive_and_deterministic() {
        let encoder = TermWeightEncoder::default();
        let a = encoder.encode("Invoice total DUE").unwrap();
        let b = encoder.encode("invoice Total due").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_norm_and_self_similarity() {
        let encoder = TermWeightEncoder::default();
        let v = encoder.encode("the quick brown fox jumps over the lazy dog").unwrap();
        assert!((v.dot(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_repeated_terms_weigh_more() {
        let encoder = TermWeightEncoder::default();
        let doc = encoder.encode("invoice invoice invoice shipping").unwrap();
        let invoice = encoder.encode("invoice").unwrap();
        let shipping = encoder.encode("shipping").unwrap();
        assert!(doc.dot(&invoice) > doc.dot(&shipping));
    }

    #[test]
    fn test_unrelated_text_scores_zero() {
        let encoder = TermWeightEncoder::default();
        let doc = encoder.encode("quarterly revenue report").unwrap();
        let query = encoder.encode("giraffe").unwrap();
        assert_eq!(doc.dot(&query), 0.0);
    }
}
