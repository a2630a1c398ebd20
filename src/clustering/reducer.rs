//! Dual projection of participant embeddings.
//!
//! Every cache build produces two projections of the same embeddings:
//! - 2D coordinates for the scatter plot (`min_dist` 0.3 keeps points readable)
//! - a 50D projection that HDBSCAN clusters on (`min_dist` 0.1 keeps it dense)

use crate::clustering::umap::{fit_transform, UmapParams};
use crate::error::{CoreError, Result};

pub const VISUAL_DIMS: usize = 2;
pub const CLUSTERING_DIMS: usize = 50;

const MAX_NEIGHBORS: usize = 15;
const VISUAL_MIN_DIST: f64 = 0.3;
const CLUSTERING_MIN_DIST: f64 = 0.1;
const SPREAD: f64 = 2.0;

/// Both projections, in the same order as the input embeddings.
#[derive(Debug, Clone)]
pub struct DualProjection {
    pub visual: Vec<(f32, f32)>,
    pub clustering: Vec<Vec<f32>>,
}

/// `min(15, N / 3)`, never below 1.
pub fn neighbor_count(n: usize) -> usize {
    (n / 3).clamp(1, MAX_NEIGHBORS)
}

fn params(n_components: usize, min_dist: f64, n: usize, seed: u64) -> UmapParams {
    UmapParams {
        n_components,
        n_neighbors: neighbor_count(n),
        min_dist,
        spread: SPREAD,
        seed,
        ..UmapParams::default()
    }
}

/// Run the 2D and 50D reductions one after the other.
///
/// CPU bound; callers on the async runtime should run it via `spawn_blocking`.
pub fn reduce(embeddings: &[Vec<f32>], seed: u64) -> Result<DualProjection> {
    let n = embeddings.len();

    let visual = fit_transform(embeddings, &params(VISUAL_DIMS, VISUAL_MIN_DIST, n, seed))?;
    tracing::debug!(points = n, "2D projection done");

    let clustering = fit_transform(
        embeddings,
        &params(CLUSTERING_DIMS, CLUSTERING_MIN_DIST, n, seed),
    )?;
    tracing::debug!(points = n, dims = CLUSTERING_DIMS, "Clustering projection done");

    let visual = visual
        .into_iter()
        .map(|row| match row.as_slice() {
            [x, y] => Ok((*x, *y)),
            other => Err(CoreError::Clustering(format!(
                "2D projection returned {} components",
                other.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DualProjection { visual, clustering })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_count() {
        assert_eq!(neighbor_count(2), 1);
        assert_eq!(neighbor_count(5), 1);
        assert_eq!(neighbor_count(9), 3);
        assert_eq!(neighbor_count(45), 15);
        assert_eq!(neighbor_count(1000), 15);
    }

    #[test]
    fn test_reduce_shapes() {
        let embeddings: Vec<Vec<f32>> = (0..8)
            .map(|i| (0..6).map(|d| ((i * 7 + d) % 5) as f32).collect())
            .collect();
        let projection = reduce(&embeddings, 42).unwrap();
        assert_eq!(projection.visual.len(), 8);
        assert_eq!(projection.clustering.len(), 8);
        assert!(projection.clustering.iter().all(|v| v.len() == CLUSTERING_DIMS));
        assert!(projection
            .visual
            .iter()
            .all(|(x, y)| x.is_finite() && y.is_finite()));
    }
}
