//! Wilcoxon rank-sum scores.
//!
//! For every gene the group's values and the reference values are ranked jointly (ties get
//! their average rank) and the rank sum of the group, `W`, is standardized with its normal
//! approximation:
//!
//! `z = (W - n(n + m + 1) / 2) / sqrt(n m (n + m + 1) / 12)`
//!
//! where `n` is the group size and `m` the reference size. Both sizes are fixed per group.

use std::cmp::Ordering;

use log::warn;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::matrix::ExpressionMatrix;

/// Genes densified per block.
pub const GENE_CHUNK_SIZE: usize = 256;

/// Populations at or below this size make the normal approximation unreliable.
pub const MIN_NORMAL_APPROX_SIZE: usize = 25;

/// Rank sum of `group` within the joint ranking of `group` and `reference`.
///
/// Ranks start at 1; tied values share the average of the ranks they span.
pub fn rank_sum(group: &[f64], reference: &[f64]) -> f64 {
    let mut combined: Vec<(f64, bool)> = Vec::with_capacity(group.len() + reference.len());
    combined.extend(group.iter().map(|&v| (v, true)));
    combined.extend(reference.iter().map(|&v| (v, false)));
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < combined.len() {
        let value = combined[i].0;
        let mut j = i + 1;
        while j < combined.len() && combined[j].0 == value {
            j += 1;
        }

        // Ranks i+1..=j averaged
        let rank = (i + j + 1) as f64 / 2.0;
        let in_group = combined[i..j].iter().filter(|(_, g)| *g).count();
        rank_sum += rank * in_group as f64;

        i = j;
    }
    rank_sum
}

/// Normal approximation of a rank sum `w` for a group of `n` against a reference of `m`.
pub fn rank_sum_zscore(w: f64, n: usize, m: usize) -> f64 {
    let n = n as f64;
    let m = m as f64;
    let expected = n * (n + m + 1.0) / 2.0;
    let sd = (n * m * (n + m + 1.0) / 12.0).sqrt();
    if sd == 0.0 {
        return 0.0;
    }
    let z = (w - expected) / sd;
    if z.is_nan() { 0.0 } else { z }
}

/// Signed rank-sum z-scores for every gene of `matrix`, group rows vs. reference rows.
pub fn wilcoxon_scores<M>(
    matrix: &M,
    group_name: &str,
    group_mask: &[bool],
    reference_mask: &[bool],
) -> anyhow::Result<Vec<f64>>
where
    M: ExpressionMatrix + ?Sized,
{
    let n = group_mask.iter().filter(|&&m| m).count();
    let m = reference_mask.iter().filter(|&&m| m).count();
    if n == 0 || m == 0 {
        return Err(anyhow::anyhow!("Group indices cannot be empty"));
    }
    if n <= MIN_NORMAL_APPROX_SIZE || m <= MIN_NORMAL_APPROX_SIZE {
        warn!(
            "group '{}': too few observations for the normal approximation (n = {}, m = {}, need > {}); consider regrouping",
            group_name, n, m, MIN_NORMAL_APPROX_SIZE
        );
    }

    let n_genes = matrix.n_genes();
    let mut scores = Vec::with_capacity(n_genes);
    let mut start = 0;
    while start < n_genes {
        let end = (start + GENE_CHUNK_SIZE).min(n_genes);
        let group_block = matrix.gene_block_masked(group_mask, start..end)?;
        let reference_block = matrix.gene_block_masked(reference_mask, start..end)?;

        let chunk: Vec<f64> = (0..end - start)
            .into_par_iter()
            .map(|j| {
                let group_values = group_block.column(j).to_vec();
                let reference_values = reference_block.column(j).to_vec();
                rank_sum_zscore(rank_sum(&group_values, &reference_values), n, m)
            })
            .collect();
        scores.extend(chunk);

        start = end;
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_rank_sum_without_ties() {
        // Joint order: 1(r) 2(g) 3(r) 4(g) -> group ranks 2 + 4
        assert_abs_diff_eq!(rank_sum(&[2.0, 4.0], &[1.0, 3.0]), 6.0);
    }

    #[test]
    fn test_rank_sum_with_ties() {
        // Values 0, 0, 0 share rank 2; 5 gets rank 4
        assert_abs_diff_eq!(rank_sum(&[0.0, 5.0], &[0.0, 0.0]), 6.0);
        // All tied: every value has rank (1 + 4) / 2
        assert_abs_diff_eq!(rank_sum(&[1.0, 1.0], &[1.0, 1.0]), 5.0);
    }

    #[test]
    fn test_fully_separated_groups() {
        let n = 10;
        let group: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let reference: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let w = rank_sum(&group, &reference);
        // Group holds the top ranks 11..=20
        assert_abs_diff_eq!(w, 155.0);

        let z = rank_sum_zscore(w, n, n);
        let nm = (n * n) as f64;
        let expected = (nm / 2.0) / (nm * (2 * n + 1) as f64 / 12.0).sqrt();
        assert!(z.is_finite());
        assert!(z > 0.0);
        assert_abs_diff_eq!(z, expected, epsilon = 1e-12);

        let z_low = rank_sum_zscore(rank_sum(&reference, &group), n, n);
        assert_abs_diff_eq!(z_low, -z, epsilon = 1e-12);
    }

    #[test]
    fn test_unequal_sizes_sign() {
        // Group above a larger reference must still score positive
        let group = [10.0, 11.0, 12.0];
        let reference = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let z = rank_sum_zscore(rank_sum(&group, &reference), 3, 7);
        assert!(z > 0.0);
    }

    #[test]
    fn test_no_difference_scores_zero() {
        let z = rank_sum_zscore(rank_sum(&[1.0, 2.0], &[1.0, 2.0]), 2, 2);
        assert_abs_diff_eq!(z, 0.0);
    }

    #[test]
    fn test_wilcoxon_scores_over_chunks() {
        // 4 samples x 300 genes, crossing a chunk boundary
        let n_genes = GENE_CHUNK_SIZE + 44;
        let matrix = Array2::from_shape_fn((4, n_genes), |(i, j)| {
            if j % 2 == 0 { i as f64 } else { -(i as f64) }
        });
        let group = [false, false, true, true];
        let reference = [true, true, false, false];
        let scores = wilcoxon_scores(&matrix, "g", &group, &reference).unwrap();
        assert_eq!(scores.len(), n_genes);
        assert!(scores[0] > 0.0);
        assert!(scores[1] < 0.0);
        assert_abs_diff_eq!(scores[n_genes - 2], scores[0]);
        assert_abs_diff_eq!(scores[n_genes - 1], scores[1]);
    }

    #[test]
    fn test_empty_population_is_error() {
        let matrix = Array2::<f64>::zeros((2, 3));
        assert!(wilcoxon_scores(&matrix, "g", &[true, true], &[false, false]).is_err());
    }
}
