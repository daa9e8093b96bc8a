use log::debug;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{RankGenesError, Result};
use crate::groups::GroupMasks;
use crate::matrix::{ExpressionMatrix, MeanVar};
use crate::ranking::{ReferencePolicy, TestType};

pub mod nonparametric;

pub mod parametric;

pub use parametric::Standardization;

/// Scores of one group against its reference population.
#[derive(Debug, Clone)]
pub struct GroupScores {
    /// One score per gene, sign policy already applied
    pub scores: Vec<f64>,
    /// Present for the t-test, and for the Wilcoxon test when requested
    pub standardization: Option<Standardization>,
}

/// Make scores sign-agnostic unless only over-expression is of interest.
pub fn apply_sign_policy(scores: &mut [f64], only_positive: bool) {
    if !only_positive {
        for s in scores.iter_mut() {
            *s = s.abs();
        }
    }
}

/// Normal-approximation p-value of a reported score.
///
/// One-sided (`P(Z > z)`) for signed scores, two-sided for absolute scores.
pub fn score_p_value(normal: &Normal, score: f64, only_positive: bool) -> f64 {
    if only_positive {
        normal.sf(score)
    } else {
        (2.0 * normal.sf(score.abs())).min(1.0)
    }
}

/// Computes per-gene differential scores for each resolved group.
///
/// For the t-test, mean and variance of every group are computed once up front. Under a
/// fixed reference these also serve as the reference statistics; under `Rest` the reference
/// statistics are recomputed per group since the complement differs for each group.
pub struct ScoreEngine<'a, M>
where
    M: ExpressionMatrix + ?Sized,
{
    matrix: &'a M,
    groups: &'a GroupMasks,
    policy: ReferencePolicy,
    test_type: TestType,
    only_positive: bool,
    group_stats: Vec<MeanVar>,
}

impl<'a, M> ScoreEngine<'a, M>
where
    M: ExpressionMatrix + ?Sized,
{
    pub fn new(
        matrix: &'a M,
        groups: &'a GroupMasks,
        policy: ReferencePolicy,
        test_type: TestType,
        only_positive: bool,
    ) -> Result<Self> {
        let group_stats = match test_type {
            TestType::TTest => (0..groups.n_groups())
                .into_par_iter()
                .map(|g| matrix.mean_var_masked(&groups.mask(g).to_vec()))
                .collect::<anyhow::Result<Vec<_>>>()?,
            TestType::Wilcoxon => Vec::new(),
        };

        Ok(ScoreEngine {
            matrix,
            groups,
            policy,
            test_type,
            only_positive,
            group_stats,
        })
    }

    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    /// Score `group`, or `None` if it is the fixed reference group.
    ///
    /// `standardize` requests the reference mean and pooled standard error even when the
    /// test itself does not need them.
    pub fn score(&self, group: usize, standardize: bool) -> Result<Option<GroupScores>> {
        let Some(reference_mask) = self.policy.reference_mask(self.groups, group) else {
            return Ok(None);
        };
        let name = &self.groups.order()[group];
        debug!("scoring group '{}' ({})", name, self.test_type);

        let (mut scores, standardization) = match self.test_type {
            TestType::TTest => {
                let group_stats = &self.group_stats[group];
                let (scores, standardization) = match self.policy {
                    ReferencePolicy::Fixed(reference) => {
                        parametric::t_test_scores(group_stats, &self.group_stats[reference])
                    }
                    ReferencePolicy::Rest => {
                        let reference_stats = self.matrix.mean_var_masked(&reference_mask)?;
                        parametric::t_test_scores(group_stats, &reference_stats)
                    }
                };
                (scores, Some(standardization))
            }
            TestType::Wilcoxon => {
                let group_mask = self.groups.mask(group).to_vec();
                let scores = nonparametric::wilcoxon_scores(
                    self.matrix,
                    name,
                    &group_mask,
                    &reference_mask,
                )?;
                let standardization = if standardize {
                    let group_stats = self.matrix.mean_var_masked(&group_mask)?;
                    let reference_stats = self.matrix.mean_var_masked(&reference_mask)?;
                    Some(Standardization::new(&group_stats, &reference_stats))
                } else {
                    None
                };
                (scores, standardization)
            }
        };

        if scores.len() != self.matrix.n_genes() {
            return Err(RankGenesError::ShapeMismatch {
                what: "score vector",
                expected: self.matrix.n_genes(),
                found: scores.len(),
            });
        }
        apply_sign_policy(&mut scores, self.only_positive);

        Ok(Some(GroupScores {
            scores,
            standardization,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::{GroupSelection, SampleGrouping};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn fixture() -> (ndarray::Array2<f64>, GroupMasks) {
        let matrix = array![
            [1.0, 2.0],
            [1.2, 2.0],
            [0.8, 2.0],
            [5.0, 2.0],
            [5.5, 2.0],
            [4.5, 2.0],
        ];
        let grouping = SampleGrouping::from_labels("k", &["a", "a", "a", "b", "b", "b"]);
        let masks = grouping.select_groups(&GroupSelection::All, None).unwrap();
        (matrix, masks)
    }

    #[test]
    fn test_sign_policy() {
        let mut scores = vec![-2.0, 0.0, 3.0];
        apply_sign_policy(&mut scores, true);
        assert_eq!(scores, vec![-2.0, 0.0, 3.0]);
        apply_sign_policy(&mut scores, false);
        assert_eq!(scores, vec![2.0, 0.0, 3.0]);
    }

    #[test]
    fn test_p_values() {
        let normal = Normal::new(0.0, 1.0).unwrap();
        assert_abs_diff_eq!(score_p_value(&normal, 0.0, true), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(score_p_value(&normal, 0.0, false), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(score_p_value(&normal, 1.959964, false), 0.05, epsilon = 1e-6);
        assert!(score_p_value(&normal, -3.0, true) > 0.99);
    }

    #[test]
    fn test_rest_policy_scores() {
        let (matrix, masks) = fixture();
        let engine =
            ScoreEngine::new(&matrix, &masks, ReferencePolicy::Rest, TestType::TTest, true).unwrap();
        let a = engine.score(0, false).unwrap().unwrap();
        let b = engine.score(1, false).unwrap().unwrap();
        assert!(a.scores[0] < 0.0);
        assert_abs_diff_eq!(a.scores[0], -b.scores[0], epsilon = 1e-12);
        // Constant gene has zero standard error
        assert_eq!(a.scores[1], 0.0);
        assert!(a.standardization.is_some());
    }

    #[test]
    fn test_fixed_reference_is_skipped() {
        let (matrix, masks) = fixture();
        let engine = ScoreEngine::new(
            &matrix,
            &masks,
            ReferencePolicy::Fixed(0),
            TestType::TTest,
            false,
        )
        .unwrap();
        assert!(engine.score(0, false).unwrap().is_none());
        let b = engine.score(1, false).unwrap().unwrap();
        assert!(b.scores[0] > 0.0);
    }

    #[test]
    fn test_wilcoxon_standardization_on_request() {
        let (matrix, masks) = fixture();
        let engine = ScoreEngine::new(
            &matrix,
            &masks,
            ReferencePolicy::Rest,
            TestType::Wilcoxon,
            true,
        )
        .unwrap();
        let plain = engine.score(1, false).unwrap().unwrap();
        assert!(plain.standardization.is_none());
        assert!(plain.scores[0] > 0.0);
        assert_eq!(plain.scores[1], 0.0);

        let with_std = engine.score(1, true).unwrap().unwrap();
        let st = with_std.standardization.unwrap();
        assert_abs_diff_eq!(st.reference_mean[0], 1.0, epsilon = 1e-12);
        assert_eq!(plain.scores, with_std.scores);
    }
}
