//! The fixed distance metric for similarity retrieval.
//!
//! Every store ranks turns by Euclidean (L2) distance to the query vector,
//! nearest first. Embedding providers return vectors meant to be compared
//! under this metric.

/// Euclidean distance between two vectors.
///
/// Returns `f64::INFINITY` if the lengths differ, so a mismatched vector
/// always sorts after every comparable one.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
