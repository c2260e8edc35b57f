//! Inference configuration resource.
//!
//! One JSON document with three sections, consumed read-only at startup:
//!
//! ```json
//! {
//!   "dataset_params": { "label_mapping": "...", "dataset_type": "...", ... },
//!   "model_params":   { "model_architecture": "...", "output_shape": [..], ... },
//!   "train_params":   { "model_load_path": "...", "allow_missing_checkpoint": .. }
//! }
//! ```
//!
//! Missing or malformed keys are a fatal startup error.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, VoxsegError};

#[derive(Debug, Clone, Deserialize)]
pub struct InferConfig {
    pub dataset_params: DatasetParams,
    pub model_params: ModelParams,
    pub train_params: TrainParams,
}

/// Dataset section: where the label mapping lives and how points are binned
/// into the voxel volume.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetParams {
    /// Path to the label-mapping resource (must contain `learning_map_inv`).
    pub label_mapping: PathBuf,

    /// Voxelizer implementation, resolved by name through the registry.
    pub dataset_type: String,

    /// When true, bin into the fixed volume below; when false, derive the
    /// volume bounds from each scan's extent.
    #[serde(default = "default_true")]
    pub fixed_volume_space: bool,

    /// Lower corner of the fixed volume, meters, `[x, y, z]`.
    pub min_volume_space: [f32; 3],

    /// Upper corner of the fixed volume, meters, `[x, y, z]`.
    pub max_volume_space: [f32; 3],

    /// Learning-space label reserved for unlabeled/ignored content.
    #[serde(default)]
    pub ignore_label: usize,
}

/// Model section: output grid geometry and class count.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelParams {
    /// Model implementation, resolved by name through the registry.
    pub model_architecture: String,

    /// Voxel grid shape `[gx, gy, gz]`; also the shape of the prediction
    /// volume's spatial axes.
    pub output_shape: [usize; 3],

    /// Number of learning-space classes the model scores per voxel.
    pub num_class: usize,

    /// Per-voxel input feature count the model expects.
    pub fea_dim: usize,
}

/// Checkpoint section. Named after the upstream training configuration it
/// mirrors; only the load path and the missing-checkpoint policy matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainParams {
    pub model_load_path: PathBuf,

    /// When true, a missing checkpoint file is tolerated and the model runs
    /// with its default-initialized parameters (a warning is logged). When
    /// false, a missing checkpoint aborts startup. Reproducing published
    /// results requires knowing which way this was set.
    #[serde(default)]
    pub allow_missing_checkpoint: bool,
}

fn default_true() -> bool {
    true
}

impl InferConfig {
    /// Load and validate the configuration resource.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| VoxsegError::io(path, e))?;
        let config: InferConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| VoxsegError::config(path, e.to_string()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.model_params.output_shape.iter().any(|&g| g == 0) {
            return Err(VoxsegError::config(path, "output_shape axes must be positive"));
        }
        if self.model_params.num_class == 0 {
            return Err(VoxsegError::config(path, "num_class must be positive"));
        }
        for axis in 0..3 {
            let (lo, hi) = (
                self.dataset_params.min_volume_space[axis],
                self.dataset_params.max_volume_space[axis],
            );
            if !(lo < hi) {
                return Err(VoxsegError::config(
                    path,
                    format!("volume space axis {axis}: min {lo} must be below max {hi}"),
                ));
            }
        }
        Ok(())
    }
}
