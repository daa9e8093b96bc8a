use single_rankgenes::matrix::{ExpressionMatrix, MeanVar};
use single_rankgenes::ranking::inference::nonparametric::{rank_sum, rank_sum_zscore};
use single_rankgenes::ranking::inference::parametric::{t_test_scores, zscore};
use single_rankgenes::ranking::select::top_k;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

#[cfg(test)]
mod quick_test {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn stats(values: &[&[f64]]) -> MeanVar {
        // genes are the inner slices, all of the same length
        let n = values[0].len();
        let mean: Vec<f64> = values.iter().map(|v| v.iter().sum::<f64>() / n as f64).collect();
        let var = values
            .iter()
            .zip(&mean)
            .map(|(v, m)| v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n as f64 - 1.0))
            .collect();
        MeanVar { mean, var, n }
    }

    #[test]
    fn check_high_vs_low_expression() {
        // High expression: [9, 10, 11, 10, 10], low expression: [1, 2, 3, 2, 2]
        let high = stats(&[&[9.0, 10.0, 11.0, 10.0, 10.0]]);
        let low = stats(&[&[1.0, 2.0, 3.0, 2.0, 2.0]]);
        let (scores, st) = t_test_scores(&high, &low);

        // var = 0.5 in both groups -> se = sqrt(0.1 + 0.1)
        assert_relative_eq!(st.pooled_se[0], 0.2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(scores[0], 8.0 / 0.2f64.sqrt(), epsilon = 1e-12);

        let (reverse, _) = t_test_scores(&low, &high);
        assert_relative_eq!(reverse[0], -scores[0], epsilon = 1e-12);
    }

    #[test]
    fn check_zero_expression_vs_expressed() {
        // Common in single-cell: expressed in one population, absent in the other
        let expressed = stats(&[&[5.0, 4.0, 6.0, 5.0, 5.0]]);
        let zero = stats(&[&[0.0, 0.0, 0.0, 0.0, 0.0]]);
        let (scores, _) = t_test_scores(&expressed, &zero);
        assert!(scores[0] > 3.0);
        assert!(scores[0].is_finite());
    }

    #[test]
    fn check_same_mean_different_variance() {
        let noisy = stats(&[&[1.0, 10.0, 2.0, 9.0, 3.0]]);
        let calm = stats(&[&[5.0, 5.0, 5.0, 5.0, 5.0]]);
        let (scores, _) = t_test_scores(&noisy, &calm);
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn check_division_by_zero_rule() {
        assert_eq!(zscore(1.0, 0.0), 0.0);
        assert_eq!(zscore(-1.0, 0.0), 0.0);
        assert_eq!(zscore(f64::INFINITY, f64::INFINITY), 0.0);
    }

    #[test]
    fn check_wilcoxon_separated_groups() {
        for n in [3usize, 10, 30] {
            let group: Vec<f64> = (0..n).map(|i| 50.0 + i as f64).collect();
            let reference: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let z = rank_sum_zscore(rank_sum(&group, &reference), n, n);
            let nm = (n * n) as f64;
            let max_z = (nm / 2.0) / (nm * (2 * n + 1) as f64 / 12.0).sqrt();
            assert!(z.is_finite() && z > 0.0);
            assert_abs_diff_eq!(z, max_z, epsilon = 1e-10);
        }
    }

    #[test]
    fn check_top_k_is_monotone() {
        let scores: Vec<f64> = (0..1000).map(|i| ((i * 7919) % 1009) as f64 * 0.01 - 5.0).collect();
        let top = top_k(&scores, 50);
        assert_eq!(top.len(), 50);
        for pair in top.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(top[0].1, max);
    }

    #[test]
    fn check_sparse_matrix_statistics() {
        // 6 cells x 3 genes
        // Gene 0: [1,1,1,5,5,5], Gene 1: [3,3,3,3,3,3], Gene 2: [0,0,1,2,3,4]
        let mut coo = CooMatrix::new(6, 3);
        coo.push(0, 0, 1.0f64); coo.push(1, 0, 1.0); coo.push(2, 0, 1.0);
        coo.push(3, 0, 5.0); coo.push(4, 0, 5.0); coo.push(5, 0, 5.0);

        coo.push(0, 1, 3.0); coo.push(1, 1, 3.0); coo.push(2, 1, 3.0);
        coo.push(3, 1, 3.0); coo.push(4, 1, 3.0); coo.push(5, 1, 3.0);

        coo.push(2, 2, 1.0);
        coo.push(3, 2, 2.0); coo.push(4, 2, 3.0); coo.push(5, 2, 4.0);

        let matrix = CsrMatrix::from(&coo);
        let first = [true, true, true, false, false, false];
        let second = [false, false, false, true, true, true];

        let g1 = matrix.mean_var_masked(&first).unwrap();
        let g2 = matrix.mean_var_masked(&second).unwrap();
        let (scores, _) = t_test_scores(&g2, &g1);

        // Gene 0 is constant within each group: zero standard error scores 0
        assert_eq!(scores[0], 0.0);
        // Gene 1 is identical everywhere
        assert_eq!(scores[1], 0.0);
        // Gene 2: means 1/3 vs 3, variances 1/3 and 1
        let expected = (3.0 - 1.0 / 3.0) / ((1.0 / 3.0) / 3.0 + 1.0 / 3.0f64).sqrt();
        assert_relative_eq!(scores[2], expected, epsilon = 1e-12);
    }
}
