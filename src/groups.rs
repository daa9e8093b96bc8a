//! Sample grouping and group mask resolution.
//!
//! A [`SampleGrouping`] is a categorical annotation of the samples (e.g. a cluster
//! assignment stored under a key such as `"leiden"`). Resolving a [`GroupSelection`]
//! against it yields [`GroupMasks`], the ordered group identifiers together with a
//! groups × samples membership matrix.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{RankGenesError, Result};

/// Categorical label per sample, stored as codes into an ordered category list.
#[derive(Debug, Clone)]
pub struct SampleGrouping {
    key: String,
    categories: Vec<String>,
    codes: Vec<usize>,
}

impl SampleGrouping {
    /// Create a grouping from explicit categories and one category code per sample.
    pub fn new(key: &str, categories: Vec<String>, codes: Vec<usize>) -> Result<Self> {
        if let Some((sample, &code)) = codes.iter().enumerate().find(|(_, c)| **c >= categories.len()) {
            return Err(RankGenesError::InvalidGroupCode {
                sample,
                code,
                n_categories: categories.len(),
            });
        }
        Ok(SampleGrouping {
            key: key.to_string(),
            categories,
            codes,
        })
    }

    /// Create a grouping from one label per sample. Categories are the sorted unique labels.
    pub fn from_labels<S: AsRef<str>>(key: &str, labels: &[S]) -> Self {
        let mut categories: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        categories.sort();
        categories.dedup();

        let codes = labels
            .iter()
            .map(|l| {
                categories
                    .binary_search_by(|c| c.as_str().cmp(l.as_ref()))
                    .unwrap_or_default()
            })
            .collect();

        SampleGrouping {
            key: key.to_string(),
            categories,
            codes,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn n_samples(&self) -> usize {
        self.codes.len()
    }

    fn category_index(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == name)
    }

    /// Resolve the groups to rank, appending `reference` when it is not already selected.
    ///
    /// Fails when the reference or any selected group is not a category of this grouping.
    pub fn select_groups(
        &self,
        selection: &GroupSelection,
        reference: Option<&str>,
    ) -> Result<GroupMasks> {
        if let Some(reference) = reference {
            if self.category_index(reference).is_none() {
                return Err(RankGenesError::InvalidReference {
                    reference: reference.to_string(),
                    groupby: self.key.clone(),
                });
            }
        }

        let mut order: Vec<String> = match selection {
            GroupSelection::All => self.categories.clone(),
            GroupSelection::Subset(groups) => {
                let mut seen = HashSet::new();
                groups
                    .iter()
                    .filter(|g| seen.insert(g.as_str()))
                    .cloned()
                    .collect()
            }
        };
        if let Some(reference) = reference {
            if !order.iter().any(|g| g == reference) {
                order.push(reference.to_string());
            }
        }

        let category_ids = order
            .iter()
            .map(|g| {
                self.category_index(g).ok_or_else(|| RankGenesError::UnknownGroup {
                    group: g.clone(),
                    groupby: self.key.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let masks = Array2::from_shape_fn((order.len(), self.codes.len()), |(g, sample)| {
            self.codes[sample] == category_ids[g]
        });

        Ok(GroupMasks { order, masks })
    }
}

/// Which groups to rank.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "SelectionRepr", into = "SelectionRepr")]
pub enum GroupSelection {
    /// Every category of the grouping, in category order
    #[default]
    All,
    /// An explicit ordered subset of category labels
    Subset(Vec<String>),
}

impl GroupSelection {
    /// Build a subset from any labels that render as strings; integer labels are coerced.
    pub fn subset<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        GroupSelection::Subset(groups.into_iter().map(|g| g.to_string()).collect())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Keyword(String),
    Labels(Vec<LabelRepr>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LabelRepr {
    Integer(i64),
    Text(String),
}

impl TryFrom<SelectionRepr> for GroupSelection {
    type Error = RankGenesError;

    fn try_from(repr: SelectionRepr) -> Result<Self> {
        match repr {
            SelectionRepr::Keyword(k) if k == "all" => Ok(GroupSelection::All),
            SelectionRepr::Keyword(k) => Err(RankGenesError::InvalidSelection(format!(
                "expected \"all\" or a list of groups, got \"{k}\""
            ))),
            SelectionRepr::Labels(labels) if labels.is_empty() => Err(
                RankGenesError::InvalidSelection("group list is empty".to_string()),
            ),
            SelectionRepr::Labels(labels) => Ok(GroupSelection::Subset(
                labels
                    .into_iter()
                    .map(|l| match l {
                        LabelRepr::Integer(i) => i.to_string(),
                        LabelRepr::Text(s) => s,
                    })
                    .collect(),
            )),
        }
    }
}

impl From<GroupSelection> for SelectionRepr {
    fn from(selection: GroupSelection) -> Self {
        match selection {
            GroupSelection::All => SelectionRepr::Keyword("all".to_string()),
            GroupSelection::Subset(groups) => {
                SelectionRepr::Labels(groups.into_iter().map(LabelRepr::Text).collect())
            }
        }
    }
}

/// Ordered group identifiers and their sample membership.
#[derive(Debug, Clone)]
pub struct GroupMasks {
    order: Vec<String>,
    masks: Array2<bool>,
}

impl GroupMasks {
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn n_groups(&self) -> usize {
        self.order.len()
    }

    pub fn n_samples(&self) -> usize {
        self.masks.ncols()
    }

    /// Groups × samples membership matrix.
    pub fn masks(&self) -> &Array2<bool> {
        &self.masks
    }

    pub fn mask(&self, group: usize) -> ArrayView1<'_, bool> {
        self.masks.row(group)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|g| g == name)
    }

    /// Number of member samples per group.
    pub fn sizes(&self) -> Vec<usize> {
        self.masks
            .outer_iter()
            .map(|row| row.iter().filter(|&&m| m).count())
            .collect()
    }
}
