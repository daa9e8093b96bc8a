//! Ranking genes by differential expression across groups of samples.
//!
//! [`rank_genes_groups`] compares every resolved group with its reference population
//! (all other samples, or one designated reference group), scores each gene with the
//! configured [`TestType`], keeps the top `n_genes` per group and returns them as
//! column-aligned tables keyed by group.
//!
//! ## Procedure
//!
//! 1. Resolve the group masks from the sample grouping.
//! 2. For the t-test, compute mean and variance of every group once.
//! 3. Per group (in parallel): derive the reference mask, score all genes, select the
//!    top genes and optionally materialize their per-sample distributions.
//! 4. Aggregate the per-group rankings into score, name and p-value tables.

use std::fmt;
use std::str::FromStr;

use log::info;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::error::{RankGenesError, Result};
use crate::groups::{GroupMasks, GroupSelection, SampleGrouping};
use crate::matrix::ExpressionMatrix;

pub mod aggregate;
pub mod distribution;
pub mod inference;
pub mod select;

pub use aggregate::{GroupRanking, RankedGene, RankingTable};
pub use distribution::{DistributionColumn, DistributionSink};
pub use inference::ScoreEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TestType {
    /// Mean difference normalized by the pooled standard error
    #[default]
    #[serde(rename = "t_test")]
    TTest,
    /// Normal approximation of the Wilcoxon rank-sum statistic
    #[serde(rename = "wilcoxon")]
    Wilcoxon,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::TTest => "t_test",
            TestType::Wilcoxon => "wilcoxon",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = RankGenesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "t_test" => Ok(TestType::TTest),
            "wilcoxon" => Ok(TestType::Wilcoxon),
            other => Err(RankGenesError::UnknownTestType(other.to_string())),
        }
    }
}

/// Which samples a group is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// All samples outside the group
    Rest,
    /// The members of the group at this position; that group itself is not scored
    Fixed(usize),
}

impl ReferencePolicy {
    pub fn is_reference(&self, group: usize) -> bool {
        matches!(self, ReferencePolicy::Fixed(r) if *r == group)
    }

    /// Reference sample mask for `group`, `None` for the fixed reference group itself.
    pub fn reference_mask(&self, groups: &GroupMasks, group: usize) -> Option<Vec<bool>> {
        match *self {
            ReferencePolicy::Rest => Some(groups.mask(group).iter().map(|&m| !m).collect()),
            ReferencePolicy::Fixed(r) if r == group => None,
            ReferencePolicy::Fixed(r) => Some(groups.mask(r).to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankGenesConfig {
    /// Groups to rank, `"all"` or an explicit ordered subset
    pub groups: GroupSelection,
    /// Compare against this group instead of the rest of the samples
    pub group_reference: Option<String>,
    /// Number of top genes reported per group
    pub n_genes: usize,
    /// Also return per-sample distributions of the top genes
    pub compute_distribution: bool,
    /// Rank by signed score; otherwise by absolute score
    pub only_positive: bool,
    pub test_type: TestType,
}

impl Default for RankGenesConfig {
    fn default() -> Self {
        RankGenesConfig {
            groups: GroupSelection::All,
            group_reference: None,
            n_genes: 100,
            compute_distribution: false,
            only_positive: true,
            test_type: TestType::TTest,
        }
    }
}

impl RankGenesConfig {
    pub fn with_groups(mut self, groups: GroupSelection) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_group_reference(mut self, reference: &str) -> Self {
        self.group_reference = Some(reference.to_string());
        self
    }

    pub fn with_n_genes(mut self, n_genes: usize) -> Self {
        self.n_genes = n_genes;
        self
    }

    pub fn with_compute_distribution(mut self, compute_distribution: bool) -> Self {
        self.compute_distribution = compute_distribution;
        self
    }

    pub fn with_only_positive(mut self, only_positive: bool) -> Self {
        self.only_positive = only_positive;
        self
    }

    pub fn with_test_type(mut self, test_type: TestType) -> Self {
        self.test_type = test_type;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_genes == 0 {
            return Err(RankGenesError::InvalidGeneCount);
        }
        Ok(())
    }
}

/// Result of a ranking call. Nothing is persisted; the caller decides where it goes.
#[derive(Debug, Clone)]
pub struct RankGenesGroups {
    /// Grouping key the groups were taken from
    pub groupby: String,
    /// Resolved group order, including the reference group
    pub groups_order: Vec<String>,
    pub group_reference: Option<String>,
    pub test_type: TestType,
    /// Z-scores, one column per scored group
    pub scores: RankingTable<f64>,
    /// Gene names aligned with `scores`
    pub names: RankingTable<String>,
    /// Normal-approximation p-values aligned with `scores`
    pub pvals: RankingTable<f64>,
    pub rankings: Vec<GroupRanking>,
    /// Empty unless `compute_distribution` was set
    pub distributions: Vec<DistributionColumn>,
}

impl RankGenesGroups {
    pub fn group(&self, name: &str) -> Option<&GroupRanking> {
        self.rankings.iter().find(|r| r.group == name)
    }

    /// Write the distribution columns into per-sample storage.
    pub fn write_distributions<S>(&self, sink: &mut S)
    where
        S: DistributionSink + ?Sized,
    {
        for column in &self.distributions {
            sink.insert_column(column.identifier.clone(), column.values.clone());
        }
    }
}

fn check_populations(
    groups: &GroupMasks,
    policy: ReferencePolicy,
    sizes: &[usize],
) -> Result<()> {
    let n_samples = groups.n_samples();
    for (g, name) in groups.order().iter().enumerate() {
        if policy.is_reference(g) {
            continue;
        }
        if sizes[g] == 0 {
            return Err(RankGenesError::EmptyGroup(name.clone()));
        }
        let n_reference = match policy {
            ReferencePolicy::Rest => n_samples - sizes[g],
            ReferencePolicy::Fixed(r) => sizes[r],
        };
        if n_reference == 0 {
            return Err(RankGenesError::EmptyReference(name.clone()));
        }
    }
    Ok(())
}

/// Rank genes by differential expression for each group of `grouping`.
///
/// # Arguments
///
/// * `matrix` - Expression matrix (samples × genes), sparse or dense
/// * `gene_names` - One name per matrix column
/// * `grouping` - Categorical group label per sample
/// * `config` - Groups, reference, test type and output options
///
/// # Returns
///
/// Per-group rankings of `min(n_genes, matrix.n_genes())` genes each, plus the optional
/// distribution columns. All validation happens before any group is scored.
pub fn rank_genes_groups<M>(
    matrix: &M,
    gene_names: &[String],
    grouping: &SampleGrouping,
    config: &RankGenesConfig,
) -> Result<RankGenesGroups>
where
    M: ExpressionMatrix + ?Sized,
{
    config.validate()?;
    info!(
        "ranking genes by differential expression (groupby = {}, test_type = {})",
        grouping.key(),
        config.test_type
    );

    if gene_names.len() != matrix.n_genes() {
        return Err(RankGenesError::ShapeMismatch {
            what: "gene names",
            expected: matrix.n_genes(),
            found: gene_names.len(),
        });
    }
    if grouping.n_samples() != matrix.n_samples() {
        return Err(RankGenesError::ShapeMismatch {
            what: "sample grouping",
            expected: matrix.n_samples(),
            found: grouping.n_samples(),
        });
    }

    let groups = grouping.select_groups(&config.groups, config.group_reference.as_deref())?;
    let policy = match config.group_reference.as_deref() {
        None => ReferencePolicy::Rest,
        Some(reference) => ReferencePolicy::Fixed(groups.position(reference).ok_or_else(|| {
            RankGenesError::InvalidReference {
                reference: reference.to_string(),
                groupby: grouping.key().to_string(),
            }
        })?),
    };

    let sizes = groups.sizes();
    info!(
        "consider '{}': {:?} with sample numbers {:?}",
        grouping.key(),
        groups.order(),
        sizes
    );
    check_populations(&groups, policy, &sizes)?;

    let engine = ScoreEngine::new(
        matrix,
        &groups,
        policy,
        config.test_type,
        config.only_positive,
    )?;
    let normal = Normal::new(0.0, 1.0).map_err(|e| RankGenesError::Statistics(e.to_string()))?;
    let n_rows = config.n_genes.min(matrix.n_genes());

    let per_group = (0..groups.n_groups())
        .into_par_iter()
        .map(|g| -> Result<Option<(GroupRanking, Vec<DistributionColumn>)>> {
            let Some(group_scores) = engine.score(g, config.compute_distribution)? else {
                return Ok(None);
            };
            let name = &groups.order()[g];

            let genes: Vec<RankedGene> = select::top_k(&group_scores.scores, n_rows)
                .into_iter()
                .map(|(index, score)| RankedGene {
                    index,
                    name: gene_names[index].clone(),
                    score,
                    p_value: inference::score_p_value(&normal, score, config.only_positive),
                })
                .collect();

            let columns = match (&group_scores.standardization, config.compute_distribution) {
                (Some(standardization), true) => distribution::materialize(
                    matrix,
                    grouping.key(),
                    name,
                    &groups.mask(g).to_vec(),
                    &genes,
                    standardization,
                )?,
                _ => Vec::new(),
            };

            Ok(Some((
                GroupRanking {
                    group: name.clone(),
                    genes,
                },
                columns,
            )))
        })
        .collect::<Result<Vec<_>>>()?;

    let (rankings, columns): (Vec<GroupRanking>, Vec<Vec<DistributionColumn>>) =
        per_group.into_iter().flatten().unzip();
    let tables = aggregate::aggregate(&rankings, n_rows)?;

    info!(
        "finished ranking {} groups, {} genes each",
        rankings.len(),
        n_rows
    );

    Ok(RankGenesGroups {
        groupby: grouping.key().to_string(),
        groups_order: groups.order().to_vec(),
        group_reference: config.group_reference.clone(),
        test_type: config.test_type,
        scores: tables.scores,
        names: tables.names,
        pvals: tables.pvals,
        rankings,
        distributions: columns.into_iter().flatten().collect(),
    })
}
