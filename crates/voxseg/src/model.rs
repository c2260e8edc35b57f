//! Inference engine: a frozen model scoring every voxel cell, plus the
//! registry that resolves an architecture name to a constructor and the
//! checkpoint-loading policy.
//!
//! Everything here is inference-only. There is no gradient machinery and no
//! parameter mutation after startup, so a built model is safely shared
//! read-only for the rest of the run.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::warn;
use ndarray::{Array1, Array2, Array3, Array4};
use serde::{Deserialize, Serialize};

use crate::config::{ModelParams, TrainParams};
use crate::error::{Result, VoxsegError};
use crate::voxelize::ScanBatch;

/// Dense per-voxel class scores, shape `(num_class, gx, gy, gz)`.
/// Scores are unnormalized; only the argmax matters downstream.
#[derive(Debug, Clone)]
pub struct PredictionVolume {
    pub scores: Array4<f32>,
}

impl PredictionVolume {
    /// Spatial shape of the volume.
    pub fn grid_size(&self) -> [usize; 3] {
        let (_, gx, gy, gz) = self.scores.dim();
        [gx, gy, gz]
    }

    /// Reduce over the class axis: one learning-space label per voxel cell.
    /// Ties resolve to the lowest class index, keeping the reduction
    /// deterministic.
    pub fn argmax_labels(&self) -> Array3<usize> {
        let (classes, gx, gy, gz) = self.scores.dim();
        Array3::from_shape_fn((gx, gy, gz), |(x, y, z)| {
            let mut best = 0usize;
            let mut best_score = self.scores[[0, x, y, z]];
            for c in 1..classes {
                let score = self.scores[[c, x, y, z]];
                if score > best_score {
                    best_score = score;
                    best = c;
                }
            }
            best
        })
    }
}

pub trait SegmentationModel: Send + Sync {
    /// Forward pass over one voxelized scan. Deterministic given the model's
    /// parameters and the batch; no side effects on the model.
    fn forward(&self, batch: &ScanBatch) -> Result<PredictionVolume>;

    /// Replace parameters with a checkpoint snapshot, validating shapes.
    fn load_checkpoint(&mut self, path: &Path) -> Result<()>;
}

/// Checkpoint snapshot: named parameter tensors with explicit shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTensor {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointSnapshot {
    parameters: HashMap<String, StoredTensor>,
}

fn read_snapshot(path: &Path) -> Result<CheckpointSnapshot> {
    let file = File::open(path).map_err(|e| VoxsegError::Checkpoint {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| VoxsegError::Checkpoint {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn take_tensor(
    snapshot: &mut CheckpointSnapshot,
    path: &Path,
    name: &str,
    rows: usize,
    cols: usize,
) -> Result<Vec<f32>> {
    let tensor = snapshot
        .parameters
        .remove(name)
        .ok_or_else(|| VoxsegError::Checkpoint {
            path: path.to_path_buf(),
            message: format!("missing parameter {name:?}"),
        })?;
    if tensor.rows != rows || tensor.cols != cols || tensor.data.len() != rows * cols {
        return Err(VoxsegError::Checkpoint {
            path: path.to_path_buf(),
            message: format!(
                "parameter {name:?} has shape {}x{} ({} values), expected {rows}x{cols}",
                tensor.rows,
                tensor.cols,
                tensor.data.len()
            ),
        });
    }
    Ok(tensor.data)
}

/// Per-voxel linear classifier: `scores = W · features + b` at every cell.
///
/// Default parameters are all zeros, which makes every voxel argmax to class
/// 0. That is the model a run falls back to when the checkpoint is missing
/// and `allow_missing_checkpoint` is set.
pub struct VoxelLinear {
    num_class: usize,
    fea_dim: usize,
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl VoxelLinear {
    pub fn new(params: &ModelParams) -> Self {
        Self {
            num_class: params.num_class,
            fea_dim: params.fea_dim,
            weight: Array2::zeros((params.num_class, params.fea_dim)),
            bias: Array1::zeros(params.num_class),
        }
    }
}

impl SegmentationModel for VoxelLinear {
    fn forward(&self, batch: &ScanBatch) -> Result<PredictionVolume> {
        let (fea_dim, gx, gy, gz) = batch.features.dim();
        if fea_dim != self.fea_dim {
            return Err(VoxsegError::scan(
                &batch.scan_id,
                format!("batch has {fea_dim} features per voxel, model expects {}", self.fea_dim),
            ));
        }

        let mut scores = Array4::<f32>::zeros((self.num_class, gx, gy, gz));
        for (c, mut class_plane) in scores.outer_iter_mut().enumerate() {
            class_plane.fill(self.bias[c]);
            for (f, feature_plane) in batch.features.outer_iter().enumerate() {
                let w = self.weight[[c, f]];
                if w != 0.0 {
                    class_plane.zip_mut_with(&feature_plane, |s, &v| *s += w * v);
                }
            }
        }
        Ok(PredictionVolume { scores })
    }

    fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        let mut snapshot = read_snapshot(path)?;
        let weight = take_tensor(&mut snapshot, path, "weight", self.num_class, self.fea_dim)?;
        let bias = take_tensor(&mut snapshot, path, "bias", 1, self.num_class)?;
        // Both shapes validated above; from_shape_vec cannot fail here.
        self.weight = Array2::from_shape_vec((self.num_class, self.fea_dim), weight)
            .map_err(|e| VoxsegError::Checkpoint {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        self.bias = Array1::from_vec(bias);
        Ok(())
    }
}

type ModelFactory = fn(&ModelParams) -> Box<dyn SegmentationModel>;

/// Startup-time mapping from `model_architecture` strings to constructors.
pub struct ModelRegistry {
    entries: Vec<(&'static str, ModelFactory)>,
}

fn build_voxel_linear(params: &ModelParams) -> Box<dyn SegmentationModel> {
    Box::new(VoxelLinear::new(params))
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            entries: vec![("voxel_linear", build_voxel_linear)],
        }
    }
}

impl ModelRegistry {
    pub fn resolve(&self, params: &ModelParams) -> Result<Box<dyn SegmentationModel>> {
        let name = params.model_architecture.as_str();
        match self.entries.iter().find(|(n, _)| *n == name) {
            Some((_, factory)) => Ok(factory(params)),
            None => Err(VoxsegError::Config {
                path: "model_params".into(),
                message: format!("unknown model_architecture {name:?}"),
            }),
        }
    }
}

/// Build the model and apply the checkpoint policy.
///
/// A missing checkpoint file aborts startup unless `allow_missing_checkpoint`
/// is set, in which case the model keeps its default parameters and the run
/// proceeds with a warning. A checkpoint that exists but fails to load is
/// always fatal.
pub fn build_model(
    registry: &ModelRegistry,
    model_params: &ModelParams,
    train_params: &TrainParams,
) -> Result<Box<dyn SegmentationModel>> {
    let mut model = registry.resolve(model_params)?;
    let path = train_params.model_load_path.as_path();
    if path.exists() {
        model.load_checkpoint(path)?;
    } else if train_params.allow_missing_checkpoint {
        warn!(
            "checkpoint {} not found; running with default-initialized parameters",
            path.display()
        );
    } else {
        return Err(VoxsegError::Checkpoint {
            path: path.to_path_buf(),
            message: "file not found (set allow_missing_checkpoint to run without it)".to_string(),
        });
    }
    Ok(model)
}
