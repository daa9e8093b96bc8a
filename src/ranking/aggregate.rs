use ndarray::{Array2, ArrayView1};

use crate::error::{RankGenesError, Result};

/// One row of a group's ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGene {
    pub index: usize,
    pub name: String,
    pub score: f64,
    pub p_value: f64,
}

/// Top-ranked genes of one group, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRanking {
    pub group: String,
    pub genes: Vec<RankedGene>,
}

/// Rank × group table; column `c` belongs to `groups()[c]`, row `r` is rank position `r`.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingTable<V> {
    groups: Vec<String>,
    values: Array2<V>,
}

impl<V> RankingTable<V> {
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_groups(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &Array2<V> {
        &self.values
    }

    pub fn column(&self, group: &str) -> Option<ArrayView1<'_, V>> {
        let c = self.groups.iter().position(|g| g == group)?;
        Some(self.values.column(c))
    }

    pub fn get(&self, rank: usize, group: &str) -> Option<&V> {
        let c = self.groups.iter().position(|g| g == group)?;
        self.values.get((rank, c))
    }
}

/// Column-aligned score, name and p-value tables.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingTables {
    pub scores: RankingTable<f64>,
    pub names: RankingTable<String>,
    pub pvals: RankingTable<f64>,
}

/// Assemble per-group rankings into tables with `n_rows` rows each.
///
/// Every group must contribute exactly `n_rows` genes.
pub fn aggregate(rankings: &[GroupRanking], n_rows: usize) -> Result<RankingTables> {
    for ranking in rankings {
        if ranking.genes.len() != n_rows {
            return Err(RankGenesError::RaggedRanking {
                group: ranking.group.clone(),
                expected: n_rows,
                found: ranking.genes.len(),
            });
        }
    }

    let groups: Vec<String> = rankings.iter().map(|r| r.group.clone()).collect();
    let shape = (n_rows, rankings.len());
    let table = |cell: &dyn Fn(&RankedGene) -> f64| RankingTable {
        groups: groups.clone(),
        values: Array2::from_shape_fn(shape, |(r, c)| cell(&rankings[c].genes[r])),
    };

    Ok(RankingTables {
        scores: table(&|gene: &RankedGene| gene.score),
        pvals: table(&|gene: &RankedGene| gene.p_value),
        names: RankingTable {
            groups: groups.clone(),
            values: Array2::from_shape_fn(shape, |(r, c)| rankings[c].genes[r].name.clone()),
        },
    })
}
