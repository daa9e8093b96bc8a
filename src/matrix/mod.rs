//! Expression matrix access for gene ranking.
//!
//! The ranking engine only ever needs two things from a samples × genes matrix: per-gene
//! summary statistics over a subset of rows, and dense blocks of gene columns over a subset
//! of rows. Both are exposed through [`ExpressionMatrix`], which is implemented for sparse
//! `CsrMatrix` and dense `Array2` storage. All statistics are accumulated in `f64`.

use std::ops::Range;

use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;
use single_utilities::traits::FloatOpsTS;

/// Per-gene mean and variance over a set of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanVar {
    /// Mean expression per gene
    pub mean: Vec<f64>,
    /// Unbiased (ddof = 1) variance per gene, 0 when fewer than 2 samples were used
    pub var: Vec<f64>,
    /// Number of samples the statistics were computed over
    pub n: usize,
}

impl MeanVar {
    fn from_moments(mean: Vec<f64>, sum_sq_dev: Vec<f64>, n: usize) -> Self {
        let var = if n < 2 {
            vec![0.0; mean.len()]
        } else {
            let denom = (n - 1) as f64;
            sum_sq_dev.into_iter().map(|ss| ss / denom).collect()
        };
        MeanVar { mean, var, n }
    }
}

/// Read access to a samples × genes expression matrix.
pub trait ExpressionMatrix: Sync {
    fn n_samples(&self) -> usize;

    fn n_genes(&self) -> usize;

    /// Per-gene mean and variance over the rows where `mask` is true.
    fn mean_var_masked(&self, mask: &[bool]) -> anyhow::Result<MeanVar>;

    /// Dense copy of the columns in `genes`, restricted to the rows where `mask` is true.
    ///
    /// The returned block has one row per selected sample (in matrix order) and one column
    /// per gene in the range.
    fn gene_block_masked(&self, mask: &[bool], genes: Range<usize>) -> anyhow::Result<Array2<f64>>;
}

fn check_mask(mask: &[bool], n_samples: usize) -> anyhow::Result<usize> {
    if mask.len() != n_samples {
        return Err(anyhow::anyhow!(
            "Mask length {} does not match number of samples {}",
            mask.len(),
            n_samples
        ));
    }
    Ok(mask.iter().filter(|&&m| m).count())
}

fn check_gene_range(genes: &Range<usize>, n_genes: usize) -> anyhow::Result<()> {
    if genes.start > genes.end || genes.end > n_genes {
        return Err(anyhow::anyhow!(
            "Gene range {:?} out of bounds for {} genes",
            genes,
            n_genes
        ));
    }
    Ok(())
}

impl<T> ExpressionMatrix for CsrMatrix<T>
where
    T: FloatOpsTS,
{
    fn n_samples(&self) -> usize {
        self.nrows()
    }

    fn n_genes(&self) -> usize {
        self.ncols()
    }

    fn mean_var_masked(&self, mask: &[bool]) -> anyhow::Result<MeanVar> {
        let n = check_mask(mask, self.nrows())?;
        let n_genes = self.ncols();

        let mut sums = vec![0.0; n_genes];
        for (row, _) in self.row_iter().zip(mask).filter(|(_, keep)| **keep) {
            for (&col, value) in row.col_indices().iter().zip(row.values()) {
                sums[col] += value.to_f64().unwrap_or(0.0);
            }
        }

        if n == 0 {
            return Ok(MeanVar::from_moments(vec![0.0; n_genes], vec![0.0; n_genes], 0));
        }
        let n_f = n as f64;
        let mean: Vec<f64> = sums.into_iter().map(|s| s / n_f).collect();

        // Implicit zeros contribute mean^2 each, so only stored entries are visited.
        let mut sum_sq_dev = vec![0.0; n_genes];
        let mut stored = vec![0usize; n_genes];
        for (row, _) in self.row_iter().zip(mask).filter(|(_, keep)| **keep) {
            for (&col, value) in row.col_indices().iter().zip(row.values()) {
                let dev = value.to_f64().unwrap_or(0.0) - mean[col];
                sum_sq_dev[col] += dev * dev;
                stored[col] += 1;
            }
        }
        for gene in 0..n_genes {
            let implicit = (n - stored[gene]) as f64;
            sum_sq_dev[gene] += implicit * mean[gene] * mean[gene];
        }

        Ok(MeanVar::from_moments(mean, sum_sq_dev, n))
    }

    fn gene_block_masked(&self, mask: &[bool], genes: Range<usize>) -> anyhow::Result<Array2<f64>> {
        let n = check_mask(mask, self.nrows())?;
        check_gene_range(&genes, self.ncols())?;

        let mut block = Array2::<f64>::zeros((n, genes.len()));
        let selected = self.row_iter().zip(mask).filter(|(_, keep)| **keep);
        for (out_row, (row, _)) in selected.enumerate() {
            let cols = row.col_indices();
            let values = row.values();
            let start = cols.partition_point(|&c| c < genes.start);
            for (&col, value) in cols[start..].iter().zip(&values[start..]) {
                if col >= genes.end {
                    break;
                }
                block[[out_row, col - genes.start]] = value.to_f64().unwrap_or(0.0);
            }
        }
        Ok(block)
    }
}

impl<T> ExpressionMatrix for Array2<T>
where
    T: FloatOpsTS,
{
    fn n_samples(&self) -> usize {
        self.nrows()
    }

    fn n_genes(&self) -> usize {
        self.ncols()
    }

    fn mean_var_masked(&self, mask: &[bool]) -> anyhow::Result<MeanVar> {
        let n = check_mask(mask, self.nrows())?;
        let n_genes = self.ncols();

        let mut sums = vec![0.0; n_genes];
        for (row, _) in self.outer_iter().zip(mask).filter(|(_, keep)| **keep) {
            for (sum, value) in sums.iter_mut().zip(row.iter()) {
                *sum += value.to_f64().unwrap_or(0.0);
            }
        }

        if n == 0 {
            return Ok(MeanVar::from_moments(vec![0.0; n_genes], vec![0.0; n_genes], 0));
        }
        let n_f = n as f64;
        let mean: Vec<f64> = sums.into_iter().map(|s| s / n_f).collect();

        let mut sum_sq_dev = vec![0.0; n_genes];
        for (row, _) in self.outer_iter().zip(mask).filter(|(_, keep)| **keep) {
            for ((ss, value), m) in sum_sq_dev.iter_mut().zip(row.iter()).zip(&mean) {
                let dev = value.to_f64().unwrap_or(0.0) - m;
                *ss += dev * dev;
            }
        }

        Ok(MeanVar::from_moments(mean, sum_sq_dev, n))
    }

    fn gene_block_masked(&self, mask: &[bool], genes: Range<usize>) -> anyhow::Result<Array2<f64>> {
        let n = check_mask(mask, self.nrows())?;
        check_gene_range(&genes, self.ncols())?;

        let mut block = Array2::<f64>::zeros((n, genes.len()));
        let selected = self.outer_iter().zip(mask).filter(|(_, keep)| **keep);
        for (out_row, (row, _)) in selected.enumerate() {
            for (offset, gene) in genes.clone().enumerate() {
                block[[out_row, offset]] = row[gene].to_f64().unwrap_or(0.0);
            }
        }
        Ok(block)
    }
}
