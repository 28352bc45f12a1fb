//! Pairwise face encoding comparison.
//!
//! The metric is picked by vector length alone: above
//! [`DENSE_DIMENSION_CUTOFF`] values the encodings are compared by cosine
//! similarity, otherwise by length-normalized Euclidean distance. Every
//! encoder tier currently produces more than 100 values, so the Euclidean
//! branch is only reachable with externally supplied vectors.

use crate::types::Encoding;

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;
pub const DENSE_DIMENSION_CUTOFF: usize = 100;

/// Cosine similarity, `None` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    (denom > 0.0).then(|| dot / denom)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Decide whether two encodings belong to the same person.
///
/// Empty vectors, length mismatches and zero-magnitude dense vectors never
/// match.
pub fn same_person(a: &[f32], b: &[f32], threshold: f32) -> bool {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return false;
    }

    let threshold = threshold as f64;
    if a.len() > DENSE_DIMENSION_CUTOFF {
        match cosine_similarity(a, b) {
            Some(similarity) => similarity > threshold,
            None => false,
        }
    } else {
        let normalized = euclidean_distance(a, b) / (a.len() as f64).sqrt();
        normalized < 1.0 - threshold
    }
}

/// Stateless comparator holding a match threshold.
#[derive(Debug, Clone, Copy)]
pub struct FaceComparator {
    pub threshold: f32,
}

impl Default for FaceComparator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl FaceComparator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn same_person(&self, a: &Encoding, b: &Encoding) -> bool {
        same_person(&a.values, &b.values, self.threshold)
    }
}
