//! Species label to leaf id mapping.
//!
//! All combinatorial code works on dense integer leaf ids; labels only
//! reappear when printing Newick output. A [`LabelMap`] is built once per
//! analysis and threaded through it by reference, so concurrent analyses
//! with independent maps are safe.

use std::collections::HashMap;

use crate::matrix::PresenceMatrix;
use crate::LeafId;

/// Bi-directional map between species labels and dense leaf ids.
///
/// Ids are the species row indices of the matrix the map was built from.
/// One id, the *root species*, is singled out: it roots the supertree and is
/// excluded from every combinatorial leaf set.
///
/// # Example
/// ```
/// use terraces::labels::LabelMap;
/// use terraces::matrix::PresenceMatrix;
///
/// let matrix = PresenceMatrix::from_rows(
///     vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
///     &[vec![1, 0], vec![1, 1], vec![0, 1]],
/// )
/// .unwrap();
/// let labels = LabelMap::from_matrix(&matrix, 1);
///
/// assert_eq!(labels.id_of("s3"), Some(2));
/// assert_eq!(labels.label_of(0), "s1");
/// assert_eq!(labels.root_id(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: Vec<String>,
    ids: HashMap<String, LeafId>,
    root: LeafId,
}

impl LabelMap {
    /// Build the map from a matrix, designating `root` as the root species
    pub fn from_matrix(matrix: &PresenceMatrix, root: LeafId) -> Self {
        let labels: Vec<String> = matrix.species().map(str::to_string).collect();
        let ids = labels
            .iter()
            .enumerate()
            .map(|(id, label)| (label.clone(), id))
            .collect();
        Self { labels, ids, root }
    }

    /// Leaf id of a species label, if the species is known
    pub fn id_of(&self, label: &str) -> Option<LeafId> {
        self.ids.get(label).copied()
    }

    /// Label of a leaf id.
    /// Panics if `id` is out of range.
    pub fn label_of(&self, id: LeafId) -> &str {
        &self.labels[id]
    }

    /// Id of the root species
    pub fn root_id(&self) -> LeafId {
        self.root
    }

    /// Number of mapped species, root species included
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the map contains no species
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_map() -> LabelMap {
        let matrix = PresenceMatrix::from_rows(
            vec![
                "ant".to_string(),
                "bee".to_string(),
                "cricket".to_string(),
            ],
            &[vec![1, 1], vec![1, 0], vec![0, 1]],
        )
        .unwrap();
        LabelMap::from_matrix(&matrix, 0)
    }

    #[test]
    fn lookup_both_ways() {
        let labels = build_map();
        assert_eq!(labels.len(), 3);
        for (id, name) in ["ant", "bee", "cricket"].iter().enumerate() {
            assert_eq!(labels.id_of(name), Some(id));
            assert_eq!(labels.label_of(id), *name);
        }
        assert_eq!(labels.id_of("dragonfly"), None);
    }

    #[test]
    fn root_species() {
        let labels = build_map();
        assert_eq!(labels.root_id(), 0);
        assert_eq!(labels.label_of(labels.root_id()), "ant");
    }
}
