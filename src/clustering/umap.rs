//! Uniform Manifold Approximation and Projection.
//!
//! A compact UMAP for the participant counts this service handles (hundreds
//! to a few thousand points): exact kNN, smooth-kNN bandwidth calibration,
//! fuzzy-union graph, `(a, b)` curve fit from `min_dist`/`spread`, and SGD
//! layout with negative sampling from a seeded random initialisation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_RANGE: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct UmapParams {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    /// Defaults by dataset size when `None`
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    pub seed: u64,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            seed: 42,
        }
    }
}

/// Project `data` into `params.n_components` dimensions; output order matches input.
pub fn fit_transform(data: &[Vec<f32>], params: &UmapParams) -> Result<Vec<Vec<f32>>> {
    let n = data.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let dim = data[0].len();
    if dim == 0 {
        return Err(CoreError::Clustering("embeddings have zero dimensions".to_string()));
    }
    if let Some(bad) = data.iter().position(|v| v.len() != dim) {
        return Err(CoreError::Clustering(format!(
            "embedding {bad} has {} dimensions, expected {dim}",
            data[bad].len()
        )));
    }
    if params.n_components == 0 {
        return Err(CoreError::Clustering("n_components must be at least 1".to_string()));
    }
    if n == 1 {
        return Ok(vec![vec![0.0; params.n_components]]);
    }

    let k = params.n_neighbors.clamp(1, n - 1);
    let n_epochs = params.n_epochs.unwrap_or_else(|| default_epochs(n));

    let knn = nearest_neighbors(data, k);
    let graph = fuzzy_simplicial_set(&knn, k);
    let (a, b) = find_ab_params(params.spread, params.min_dist);

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut embedding: Vec<f64> = (0..n * params.n_components)
        .map(|_| rng.gen_range(-INIT_RANGE..INIT_RANGE))
        .collect();

    optimize_layout(
        &mut embedding,
        params.n_components,
        &graph,
        n_epochs,
        a,
        b,
        params,
        &mut rng,
    );

    Ok(embedding
        .chunks(params.n_components)
        .map(|row| row.iter().map(|&v| v as f32).collect())
        .collect())
}

fn default_epochs(n: usize) -> usize {
    match n {
        0..=2_500 => 500,
        2_501..=5_000 => 400,
        5_001..=7_500 => 300,
        _ => 200,
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Exact k nearest neighbours of every point (self excluded), nearest first.
fn nearest_neighbors(data: &[Vec<f32>], k: usize) -> Vec<Vec<(usize, f64)>> {
    (0..data.len())
        .map(|i| {
            let mut dists: Vec<(usize, f64)> = (0..data.len())
                .filter(|&j| j != i)
                .map(|j| (j, euclidean(&data[i], &data[j])))
                .collect();
            dists.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            dists.truncate(k);
            dists
        })
        .collect()
}

/// Per-point `(rho, sigma)`: distance to the nearest neighbour and the
/// bandwidth making the neighbourhood's total membership equal `log2(k)`.
fn smooth_knn_dist(knn: &[Vec<(usize, f64)>], k: usize) -> Vec<(f64, f64)> {
    let target = (k as f64).log2();
    let mean_all: f64 = {
        let (sum, count) = knn
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, c), (_, d)| (s + d, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    };

    knn.iter()
        .map(|neighbors| {
            let rho = neighbors
                .iter()
                .map(|(_, d)| *d)
                .find(|d| *d > 0.0)
                .unwrap_or(0.0);

            let mut lo = 0.0f64;
            let mut hi = f64::INFINITY;
            let mut mid = 1.0f64;

            for _ in 0..64 {
                let psum: f64 = neighbors
                    .iter()
                    .map(|(_, d)| {
                        let gap = d - rho;
                        if gap > 0.0 {
                            (-gap / mid).exp()
                        } else {
                            1.0
                        }
                    })
                    .sum();

                if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                    break;
                }
                if psum > target {
                    hi = mid;
                    mid = (lo + hi) / 2.0;
                } else {
                    lo = mid;
                    mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
                }
            }

            let mean_local = neighbors.iter().map(|(_, d)| d).sum::<f64>() / neighbors.len() as f64;
            let floor = if rho > 0.0 {
                MIN_K_DIST_SCALE * mean_local
            } else {
                MIN_K_DIST_SCALE * mean_all
            };
            (rho, mid.max(floor).max(f64::MIN_POSITIVE))
        })
        .collect()
}

/// Symmetrised membership graph as `(head, tail, weight)` edges.
fn fuzzy_simplicial_set(knn: &[Vec<(usize, f64)>], k: usize) -> Vec<(usize, usize, f64)> {
    let calib = smooth_knn_dist(knn, k);

    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, neighbors) in knn.iter().enumerate() {
        let (rho, sigma) = calib[i];
        for &(j, d) in neighbors {
            let w = if d - rho <= 0.0 {
                1.0
            } else {
                (-(d - rho) / sigma).exp()
            };
            directed.insert((i, j), w);
        }
    }

    // Fuzzy union: w_ij + w_ji - w_ij * w_ji
    let mut edges = Vec::with_capacity(directed.len() * 2);
    let mut seen: BTreeMap<(usize, usize), ()> = BTreeMap::new();
    for (&(i, j), &w_ij) in &directed {
        let key = (i.min(j), i.max(j));
        if seen.insert(key, ()).is_some() {
            continue;
        }
        let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let w = w_ij + w_ji - w_ij * w_ji;
        if w > 0.0 {
            edges.push((i, j, w));
            edges.push((j, i, w));
        }
    }
    edges
}

/// Fit `1 / (1 + a * x^(2b))` to the target curve defined by `spread` and
/// `min_dist` with Levenberg-Marquardt.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..300).map(|i| spread * 3.0 * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let r = y - 1.0 / (1.0 + a * x.powf(2.0 * b));
                r * r
            })
            .sum()
    };

    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut lambda = 1e-3;
    let mut err = sse(a, b);

    for _ in 0..200 {
        // Normal equations J^T J and J^T r for the two parameters
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x <= 0.0 {
                continue;
            }
            let p = x.powf(2.0 * b);
            let denom = 1.0 + a * p;
            let f = 1.0 / denom;
            let r = y - f;
            let da = -p / (denom * denom);
            let db = -a * p * 2.0 * x.ln() / (denom * denom);
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let m_aa = jaa * (1.0 + lambda);
        let m_bb = jbb * (1.0 + lambda);
        let det = m_aa * m_bb - jab * jab;
        if det.abs() < 1e-300 {
            break;
        }
        let step_a = (m_bb * ga - jab * gb) / det;
        let step_b = (m_aa * gb - jab * ga) / det;

        let (na, nb) = (a + step_a, b + step_b);
        if na <= 0.0 || nb <= 0.0 {
            lambda *= 10.0;
            continue;
        }
        let new_err = sse(na, nb);
        if new_err < err {
            let converged = (err - new_err).abs() < 1e-12;
            a = na;
            b = nb;
            err = new_err;
            lambda = (lambda / 10.0).max(1e-12);
            if converged {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    (a, b)
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

#[allow(clippy::too_many_arguments)]
fn optimize_layout(
    embedding: &mut [f64],
    dim: usize,
    edges: &[(usize, usize, f64)],
    n_epochs: usize,
    a: f64,
    b: f64,
    params: &UmapParams,
    rng: &mut StdRng,
) {
    if edges.is_empty() || n_epochs == 0 {
        return;
    }
    let n = embedding.len() / dim;
    let max_w = edges.iter().map(|e| e.2).fold(0.0f64, f64::max);

    // Edges too weak to be sampled even once are dropped
    let min_w = max_w / n_epochs as f64;
    let edges: Vec<&(usize, usize, f64)> = edges.iter().filter(|e| e.2 >= min_w).collect();

    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_w / e.2).collect();
    let neg_rate = params.negative_sample_rate.max(1) as f64;
    let epochs_per_negative: Vec<f64> = epochs_per_sample.iter().map(|e| e / neg_rate).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let mut delta = vec![0.0f64; dim];

    for epoch in 0..n_epochs {
        let alpha = params.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
        let now = epoch as f64;

        for (e, &&(head, tail, _)) in edges.iter().enumerate() {
            if next_sample[e] > now {
                continue;
            }

            let dist_sq = squared_distance(embedding, dim, head, tail);
            let coeff = if dist_sq > 0.0 {
                -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..dim {
                delta[d] = clip(coeff * (embedding[head * dim + d] - embedding[tail * dim + d])) * alpha;
            }
            for d in 0..dim {
                embedding[head * dim + d] += delta[d];
                embedding[tail * dim + d] -= delta[d];
            }
            next_sample[e] += epochs_per_sample[e];

            let n_neg = ((now - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
            for _ in 0..n_neg {
                let other = rng.gen_range(0..n);
                if other == head {
                    continue;
                }
                let dist_sq = squared_distance(embedding, dim, head, other);
                for d in 0..dim {
                    let diff = embedding[head * dim + d] - embedding[other * dim + d];
                    let grad = if dist_sq > 0.0 {
                        let coeff = 2.0 * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0));
                        clip(coeff * diff)
                    } else {
                        GRADIENT_CLIP
                    };
                    embedding[head * dim + d] += grad * alpha;
                }
            }
            next_negative[e] += n_neg as f64 * epochs_per_negative[e];
        }
    }
}

fn squared_distance(embedding: &[f64], dim: usize, i: usize, j: usize) -> f64 {
    (0..dim)
        .map(|d| {
            let diff = embedding[i * dim + d] - embedding[j * dim + d];
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well separated blobs in 8 dimensions.
    fn two_blobs(per_blob: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = Vec::new();
        for center in [0.0f32, 20.0] {
            for _ in 0..per_blob {
                data.push((0..8).map(|_| center + rng.gen::<f32>()).collect());
            }
        }
        data
    }

    fn centroid(points: &[Vec<f32>]) -> Vec<f32> {
        let dim = points[0].len();
        (0..dim)
            .map(|d| points.iter().map(|p| p[d]).sum::<f32>() / points.len() as f32)
            .collect()
    }

    #[test]
    fn test_ab_fit_matches_reference_curve() {
        // Reference UMAP values for spread=1.0, min_dist=0.1 are a≈1.577, b≈0.895
        let (a, b) = find_ab_params(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.1, "a = {a}");
        assert!((b - 0.895).abs() < 0.05, "b = {b}");
    }

    #[test]
    fn test_output_shape_and_order() {
        let data = two_blobs(10);
        let params = UmapParams {
            n_components: 3,
            n_neighbors: 5,
            n_epochs: Some(50),
            ..UmapParams::default()
        };
        let out = fit_transform(&data, &params).unwrap();
        assert_eq!(out.len(), data.len());
        assert!(out.iter().all(|row| row.len() == 3));
        assert!(out.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_separated_blobs_stay_separated() {
        let data = two_blobs(15);
        let params = UmapParams {
            n_components: 2,
            n_neighbors: 5,
            n_epochs: Some(200),
            ..UmapParams::default()
        };
        let out = fit_transform(&data, &params).unwrap();

        let (left, right) = out.split_at(15);
        let (cl, cr) = (centroid(left), centroid(right));
        let between = euclidean(&cl, &cr);
        let spread_left = left.iter().map(|p| euclidean(p, &cl)).fold(0.0, f64::max);
        let spread_right = right.iter().map(|p| euclidean(p, &cr)).fold(0.0, f64::max);
        assert!(between > spread_left.max(spread_right), "blobs overlap");
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let data = two_blobs(6);
        let params = UmapParams {
            n_neighbors: 3,
            n_epochs: Some(30),
            ..UmapParams::default()
        };
        assert_eq!(
            fit_transform(&data, &params).unwrap(),
            fit_transform(&data, &params).unwrap()
        );
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let data = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(fit_transform(&data, &UmapParams::default()).is_err());
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(fit_transform(&[], &UmapParams::default()).unwrap().is_empty());
        let single = fit_transform(&[vec![1.0, 2.0]], &UmapParams::default()).unwrap();
        assert_eq!(single, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_single_neighbor_graph() {
        let data = two_blobs(2);
        let knn = nearest_neighbors(&data, 1);
        let edges = fuzzy_simplicial_set(&knn, 1);
        assert!(!edges.is_empty());
        assert!(edges.iter().all(|e| e.2 > 0.0 && e.2 <= 1.0));
    }
}
