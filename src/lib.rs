//! # single-rankgenes
//!
//! Marker gene ranking for grouped single-cell data, part of the single-rust ecosystem.
//!
//! This crate ranks genes by differential expression between predefined groups of cells
//! (e.g. clusters) and a reference population: either all cells outside the group, or one
//! designated reference group. It works on sparse `CsrMatrix` and dense `Array2` matrices
//! and produces deterministic rankings.
//!
//! ## Core Features
//!
//! - **T-test scores**: mean difference normalized by the pooled standard error
//! - **Wilcoxon scores**: normal approximation of the rank-sum statistic
//! - **Top-k selection**: partition-then-sort selection of the best genes per group
//! - **Distributions**: per-cell standardized residuals of the top genes for plotting
//!
//! ## Quick Start
//!
//! Build a [`groups::SampleGrouping`] from the cluster labels, configure the run with
//! [`ranking::RankGenesConfig`] and call [`ranking::rank_genes_groups`].
//!
//! ## Module Organization
//!
//! - **[`ranking`]**: Score engine, top-k selection, distributions and result tables
//! - **[`groups`]**: Sample grouping and group mask resolution
//! - **[`matrix`]**: Expression matrix access and per-gene summary statistics
//! - **[`error`]**: Error types

pub mod error;
pub mod groups;
pub mod matrix;
pub mod ranking;

pub use error::{RankGenesError, Result};
pub use ranking::{rank_genes_groups, RankGenesConfig, RankGenesGroups, TestType};
