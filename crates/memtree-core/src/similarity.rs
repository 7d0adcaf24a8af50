//! ============================================================================
//! Similarity Utility - Cosine similarity between embedding vectors
//! ============================================================================

use crate::error::Error;

/// Cosine similarity between two equal-length vectors.
///
/// Returns `Error::VectorLength` when the vectors differ in length.
/// A zero-magnitude vector (including the empty vector) yields `Ok(0.0)`
/// rather than an error: an absent embedding is "similar to nothing".
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, Error> {
    if a.len() != b.len() {
        return Err(Error::VectorLength {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}
