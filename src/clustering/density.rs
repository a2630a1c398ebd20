//! HDBSCAN over projected points.

use hdbscan::{Hdbscan, HdbscanHyperParams};
use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, Result};

pub const NOISE_LABEL: i32 = -1;

/// Cluster `data`, returning one label per point (`-1` for noise).
///
/// Cluster ids are renumbered `0..k` in order of first appearance. Inputs too
/// small for the requested density parameters come back as all noise.
pub fn cluster_points(
    data: &[Vec<f32>],
    min_cluster_size: usize,
    min_samples: usize,
) -> Result<Vec<i32>> {
    let n = data.len();
    let min_cluster_size = min_cluster_size.max(2);
    let min_samples = min_samples.max(1);

    if n < min_cluster_size || n <= min_samples {
        tracing::debug!(
            points = n,
            min_cluster_size,
            min_samples,
            "Too few points for density clustering, all noise"
        );
        return Ok(vec![NOISE_LABEL; n]);
    }

    let params = HdbscanHyperParams::builder()
        .min_cluster_size(min_cluster_size)
        .min_samples(min_samples)
        .build();

    let raw = Hdbscan::new(data, params)
        .cluster()
        .map_err(|e| CoreError::Clustering(format!("HDBSCAN failed: {e}")))?;

    Ok(relabel_in_order(&raw))
}

/// Renumber non-noise labels contiguously by first appearance.
pub fn relabel_in_order(raw: &[i32]) -> Vec<i32> {
    let mut mapping: HashMap<i32, i32> = HashMap::new();
    raw.iter()
        .map(|&label| {
            if label < 0 {
                return NOISE_LABEL;
            }
            let next = mapping.len() as i32;
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

/// Point count per label, ordered by label (noise first).
pub fn label_counts(labels: &[i32]) -> Vec<(i32, usize)> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_default() += 1;
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relabel_is_contiguous() {
        assert_eq!(
            relabel_in_order(&[3, 3, -1, 0, 7, 0, -1]),
            vec![0, 0, -1, 1, 2, 1, -1]
        );
    }

    #[test]
    fn test_label_counts_sorted() {
        assert_eq!(
            label_counts(&[1, 0, -1, 1, 1]),
            vec![(-1, 1), (0, 1), (1, 3)]
        );
    }

    #[test]
    fn test_too_few_points_is_all_noise() {
        let data = vec![vec![0.0, 0.0], vec![0.1, 0.1], vec![5.0, 5.0]];
        assert_eq!(cluster_points(&data, 5, 3).unwrap(), vec![-1, -1, -1]);
    }

    #[test]
    fn test_two_groups_found() {
        let mut data = Vec::new();
        for i in 0..10 {
            let jitter = i as f32 * 0.01;
            data.push(vec![jitter, jitter]);
            data.push(vec![10.0 + jitter, 10.0 - jitter]);
        }
        let labels = cluster_points(&data, 5, 3).unwrap();
        // Interior points are never noise
        let left = labels[8];
        let right = labels[9];
        assert!(left >= 0 && right >= 0);
        assert_ne!(left, right);
        for (i, label) in labels.iter().enumerate() {
            let other = if i % 2 == 0 { right } else { left };
            assert_ne!(*label, other);
        }
    }
}
