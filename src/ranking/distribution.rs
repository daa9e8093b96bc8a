use std::collections::HashMap;

use crate::error::Result;
use crate::matrix::ExpressionMatrix;
use crate::ranking::aggregate::RankedGene;
use crate::ranking::inference::Standardization;

/// Per-sample standardized residuals of one top-ranked gene of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionColumn {
    /// `rank_genes_{groupby}_{group}_{rank}_{gene}`
    pub identifier: String,
    /// One entry per sample, NaN outside the group
    pub values: Vec<f64>,
}

/// Per-sample storage that distribution columns can be written into.
pub trait DistributionSink {
    fn insert_column(&mut self, identifier: String, values: Vec<f64>);
}

impl DistributionSink for HashMap<String, Vec<f64>> {
    fn insert_column(&mut self, identifier: String, values: Vec<f64>) {
        self.insert(identifier, values);
    }
}

pub fn build_identifier(groupby: &str, group: &str, rank: usize, gene_name: &str) -> String {
    format!("rank_genes_{}_{}_{}_{}", groupby, group, rank, gene_name)
}

/// Standardized residuals `(x - mean_ref) / se` of each ranked gene over the group's samples.
pub fn materialize<M>(
    matrix: &M,
    groupby: &str,
    group: &str,
    mask: &[bool],
    genes: &[RankedGene],
    standardization: &Standardization,
) -> Result<Vec<DistributionColumn>>
where
    M: ExpressionMatrix + ?Sized,
{
    let members: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, &m)| if m { Some(i) } else { None })
        .collect();

    genes
        .iter()
        .enumerate()
        .map(|(rank, gene)| {
            let block = matrix.gene_block_masked(mask, gene.index..gene.index + 1)?;
            let mut values = vec![f64::NAN; mask.len()];
            for (&sample, &x) in members.iter().zip(block.column(0)) {
                values[sample] = standardization.residual(gene.index, x);
            }
            Ok(DistributionColumn {
                identifier: build_identifier(groupby, group, rank, &gene.name),
                values,
            })
        })
        .collect()
}
