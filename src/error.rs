use thiserror::Error;

/// Errors raised while setting up or running a gene ranking.
///
/// Every variant except `Matrix` is detected before scoring starts, so a failed
/// call never leaves partial output behind.
#[derive(Debug, Error)]
pub enum RankGenesError {
    #[error("unknown test type '{0}', expected 't_test' or 'wilcoxon'")]
    UnknownTestType(String),

    #[error("group_reference = {reference} needs to be one of groupby = {groupby}")]
    InvalidReference { reference: String, groupby: String },

    #[error("group '{group}' is not a category of groupby = {groupby}")]
    UnknownGroup { group: String, groupby: String },

    #[error("invalid group selection: {0}")]
    InvalidSelection(String),

    #[error("n_genes must be a positive integer")]
    InvalidGeneCount,

    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("sample {sample} has category code {code}, but only {n_categories} categories exist")]
    InvalidGroupCode {
        sample: usize,
        code: usize,
        n_categories: usize,
    },

    #[error("group '{0}' contains no samples")]
    EmptyGroup(String),

    #[error("reference population for group '{0}' contains no samples")]
    EmptyReference(String),

    #[error("group '{group}' produced {found} ranked genes, expected {expected}")]
    RaggedRanking {
        group: String,
        expected: usize,
        found: usize,
    },

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error(transparent)]
    Matrix(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RankGenesError>;
