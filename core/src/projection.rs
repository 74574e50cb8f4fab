//! Two-dimensional projection of TF-IDF rows with Barnes-Hut t-SNE.

use crate::tfidf::sparse_distance;
use crate::{Point, SparseVec};
use std::f32::consts::TAU;

/// Below this many samples t-SNE is not run and documents are placed on a
/// unit circle instead.
pub const MIN_TSNE_SAMPLES: usize = 8;

#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    pub perplexity: f32,
    /// Barnes-Hut accuracy/speed trade-off.
    pub theta: f32,
    pub epochs: usize,
    pub learning_rate: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self { perplexity: 30.0, theta: 0.5, epochs: 1000, learning_rate: 200.0 }
    }
}

/// Project every row to a 2D point, preserving row order.
///
/// The embedding is not seeded, so repeated runs give different layouts.
pub fn project(rows: &[SparseVec], config: &ProjectionConfig) -> Vec<Point> {
    let n = rows.len();
    if n < MIN_TSNE_SAMPLES {
        return circle_layout(n);
    }
    // Perplexity must leave at least 3 * perplexity neighbours per sample.
    let perplexity = config.perplexity.min((n - 1) as f32 / 3.0);
    tracing::info!(samples = n, perplexity, epochs = config.epochs, "running t-SNE");

    let mut tsne = bhtsne::tSNE::new(rows);
    tsne.embedding_dim(2)
        .perplexity(perplexity)
        .epochs(config.epochs)
        .learning_rate(config.learning_rate)
        .barnes_hut(config.theta, |a, b| sparse_distance(a, b));
    let flat: Vec<f32> = tsne.embedding();
    flat.chunks_exact(2).map(|xy| [xy[0], xy[1]]).collect()
}

/// Evenly spaced points on the unit circle, in input order.
pub fn circle_layout(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let angle = TAU * i as f32 / n as f32;
            [angle.cos(), angle.sin()]
        })
        .collect()
}
