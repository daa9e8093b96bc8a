//! Normalized mean-difference scores.
//!
//! Each gene is scored as `(mean_group - mean_ref) / se` with the unpooled standard error
//! `se = sqrt(var_group / n_group + var_ref / n_ref)`, computed from precomputed summary
//! statistics so that the whole gene vector is scored in a single pass.

use crate::matrix::MeanVar;

/// Reference mean and pooled standard error per gene, used to standardize expression values.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardization {
    pub reference_mean: Vec<f64>,
    pub pooled_se: Vec<f64>,
}

impl Standardization {
    pub fn new(group: &MeanVar, reference: &MeanVar) -> Self {
        Standardization {
            reference_mean: reference.mean.clone(),
            pooled_se: pooled_standard_error(group, reference),
        }
    }

    /// Standardized residual of `value` for `gene`, NaN when the standard error is 0.
    #[inline]
    pub fn residual(&self, gene: usize, value: f64) -> f64 {
        let se = self.pooled_se[gene];
        if se == 0.0 {
            f64::NAN
        } else {
            (value - self.reference_mean[gene]) / se
        }
    }
}

/// Per-gene `sqrt(var_group / n_group + var_ref / n_ref)`.
pub fn pooled_standard_error(group: &MeanVar, reference: &MeanVar) -> Vec<f64> {
    let n_group = group.n as f64;
    let n_ref = reference.n as f64;
    group
        .var
        .iter()
        .zip(&reference.var)
        .map(|(&vg, &vr)| (vg / n_group + vr / n_ref).sqrt())
        .collect()
}

/// Score a mean difference against its standard error.
///
/// A zero standard error scores 0, as does any undefined quotient.
#[inline]
pub fn zscore(mean_diff: f64, se: f64) -> f64 {
    if se == 0.0 {
        return 0.0;
    }
    let z = mean_diff / se;
    if z.is_nan() { 0.0 } else { z }
}

/// Signed z-scores of `group` against `reference`, together with the standardization used.
pub fn t_test_scores(group: &MeanVar, reference: &MeanVar) -> (Vec<f64>, Standardization) {
    let standardization = Standardization::new(group, reference);
    let scores = group
        .mean
        .iter()
        .zip(&reference.mean)
        .zip(&standardization.pooled_se)
        .map(|((&mg, &mr), &se)| zscore(mg - mr, se))
        .collect();
    (scores, standardization)
}
