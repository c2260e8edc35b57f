//! Bidirectional mapping between the compact learning-space labels the model
//! predicts and the original benchmark label space evaluation tools expect.
//!
//! Loaded once at startup from a JSON resource and shared read-only for the
//! rest of the run.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, VoxsegError};

#[derive(Debug, Deserialize)]
struct TaxonomyDoc {
    /// learning-space label -> original-space label
    learning_map_inv: BTreeMap<usize, u32>,
}

#[derive(Debug, Clone)]
pub struct LabelTaxonomy {
    learning_map_inv: BTreeMap<usize, u32>,
    original_to_learning: BTreeMap<u32, usize>,
}

impl LabelTaxonomy {
    /// Parse the label-mapping resource. The `learning_map_inv` key is
    /// required; a resource without it is a fatal configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| VoxsegError::io(path, e))?;
        let doc: TaxonomyDoc = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| VoxsegError::config(path, e.to_string()))?;
        if doc.learning_map_inv.is_empty() {
            return Err(VoxsegError::config(path, "learning_map_inv is empty"));
        }
        Ok(Self::from_map(doc.learning_map_inv))
    }

    pub fn from_map(learning_map_inv: BTreeMap<usize, u32>) -> Self {
        let original_to_learning = learning_map_inv
            .iter()
            .map(|(&learning, &original)| (original, learning))
            .collect();
        Self {
            learning_map_inv,
            original_to_learning,
        }
    }

    /// Remap a learning-space label into the original label space.
    ///
    /// Total over the set of labels the model can emit; anything outside that
    /// domain is `UnknownLabel` rather than a silent default.
    pub fn remap(&self, learning: usize) -> Result<u32> {
        self.learning_map_inv
            .get(&learning)
            .copied()
            .ok_or(VoxsegError::UnknownLabel { label: learning })
    }

    /// Reverse lookup: original-space label back to learning space.
    pub fn to_learning(&self, original: u32) -> Option<usize> {
        self.original_to_learning.get(&original).copied()
    }

    /// Number of learning-space labels with an inverse mapping.
    pub fn num_learning_labels(&self) -> usize {
        self.learning_map_inv.len()
    }

    /// Learning-space labels in ascending order.
    pub fn learning_labels(&self) -> impl Iterator<Item = usize> + '_ {
        self.learning_map_inv.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn small_taxonomy() -> LabelTaxonomy {
        LabelTaxonomy::from_map(BTreeMap::from([(0, 0), (1, 10), (2, 20)]))
    }

    #[test]
    fn remap_is_total_over_known_labels() {
        let tax = small_taxonomy();
        for label in tax.learning_labels().collect::<Vec<_>>() {
            tax.remap(label).unwrap();
        }
        assert_eq!(tax.remap(1).unwrap(), 10);
        assert_eq!(tax.remap(2).unwrap(), 20);
    }

    #[test]
    fn unknown_label_is_an_error_not_a_sentinel() {
        let tax = small_taxonomy();
        match tax.remap(3) {
            Err(VoxsegError::UnknownLabel { label: 3 }) => {}
            other => panic!("expected UnknownLabel, got {other:?}"),
        }
    }

    #[test]
    fn reverse_map_inverts_forward_map() {
        let tax = small_taxonomy();
        assert_eq!(tax.to_learning(10), Some(1));
        assert_eq!(tax.to_learning(99), None);
    }

    #[test]
    fn loads_from_json_resource() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let mut f = File::create(&path).unwrap();
        f.write_all(br#"{"learning_map_inv": {"0": 0, "1": 10, "2": 11}}"#)
            .unwrap();
        let tax = LabelTaxonomy::load(&path).unwrap();
        assert_eq!(tax.num_learning_labels(), 3);
        assert_eq!(tax.remap(2).unwrap(), 11);
    }

    #[test]
    fn missing_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let mut f = File::create(&path).unwrap();
        f.write_all(br#"{"learning_map": {"0": 0}}"#).unwrap();
        assert!(matches!(
            LabelTaxonomy::load(&path),
            Err(VoxsegError::Config { .. })
        ));
    }
}
