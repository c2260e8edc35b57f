//! Point-to-voxel adapter: bins an unordered point cloud into a fixed voxel
//! grid and records, per point, the owning cell so predictions can later be
//! projected back onto the points.
//!
//! Implementations are selected by name through [`VoxelizerRegistry`], so the
//! dataset variant is an ordinary startup-time lookup rather than anything
//! dynamic.

use ndarray::Array4;
use rayon::prelude::*;

use crate::config::{DatasetParams, ModelParams};
use crate::error::{Result, VoxsegError};
use crate::scan::PointCloud;

/// Per-voxel input features produced by the shipped voxelizer:
/// occupancy count, mean height, mean reflectance.
pub const FEATURE_DIM: usize = 3;

/// One unit of inference work: the original points, each point's voxel cell,
/// and the dense feature grid the model consumes. Batch size is fixed at one
/// scan to bound peak memory.
#[derive(Debug, Clone)]
pub struct ScanBatch {
    pub scan_id: String,
    pub cloud: PointCloud,
    /// `(x, y, z)` cell per point, each in `[0, grid_size)` on its axis.
    pub voxel_index: Vec<[usize; 3]>,
    /// Shape `(fea_dim, gx, gy, gz)`.
    pub features: Array4<f32>,
}

pub trait Voxelizer: Send + Sync {
    fn voxelize(&self, scan_id: &str, cloud: PointCloud) -> Result<ScanBatch>;

    fn grid_size(&self) -> [usize; 3];
}

/// Regular cartesian binning over a rectangular volume.
///
/// With `fixed_volume_space` the volume corners come from configuration and
/// out-of-volume points are clamped onto the boundary cells; otherwise the
/// volume is fitted to each scan's extent. Either way every produced index is
/// in bounds by construction.
pub struct CartesianVoxelizer {
    grid: [usize; 3],
    fixed_volume: bool,
    min_volume: [f32; 3],
    max_volume: [f32; 3],
}

impl CartesianVoxelizer {
    pub fn new(dataset: &DatasetParams, model: &ModelParams) -> Result<Self> {
        if model.fea_dim != FEATURE_DIM {
            return Err(VoxsegError::config(
                "model_params",
                format!(
                    "cartesian_voxel produces {FEATURE_DIM} features per voxel, \
                     model_params.fea_dim is {}",
                    model.fea_dim
                ),
            ));
        }
        Ok(Self {
            grid: model.output_shape,
            fixed_volume: dataset.fixed_volume_space,
            min_volume: dataset.min_volume_space,
            max_volume: dataset.max_volume_space,
        })
    }

    fn volume_bounds(&self, cloud: &PointCloud) -> ([f32; 3], [f32; 3]) {
        if self.fixed_volume || cloud.is_empty() {
            return (self.min_volume, self.max_volume);
        }

        let mut lo = [f32::INFINITY; 3];
        let mut hi = [f32::NEG_INFINITY; 3];
        for p in &cloud.points {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(p[axis]);
                hi[axis] = hi[axis].max(p[axis]);
            }
        }
        // A flat axis would make the cell size zero; give it some width.
        for axis in 0..3 {
            if hi[axis] - lo[axis] < f32::EPSILON {
                hi[axis] = lo[axis] + 1.0;
            }
        }
        (lo, hi)
    }
}

impl Voxelizer for CartesianVoxelizer {
    fn voxelize(&self, scan_id: &str, cloud: PointCloud) -> Result<ScanBatch> {
        let (lo, hi) = self.volume_bounds(&cloud);
        let grid = self.grid;
        let cell = [
            (hi[0] - lo[0]) / grid[0] as f32,
            (hi[1] - lo[1]) / grid[1] as f32,
            (hi[2] - lo[2]) / grid[2] as f32,
        ];

        let voxel_index: Vec<[usize; 3]> = cloud
            .points
            .par_iter()
            .map(|p| {
                let mut index = [0usize; 3];
                for axis in 0..3 {
                    let clamped = p[axis].clamp(lo[axis], hi[axis]);
                    let bin = ((clamped - lo[axis]) / cell[axis]).floor() as isize;
                    index[axis] = bin.clamp(0, grid[axis] as isize - 1) as usize;
                }
                index
            })
            .collect();

        // Accumulate per-voxel occupancy, height and reflectance sums, then
        // normalize the sums into means.
        let (gx, gy, gz) = (grid[0], grid[1], grid[2]);
        let mut features = Array4::<f32>::zeros((FEATURE_DIM, gx, gy, gz));
        for (point, &[x, y, z]) in cloud.points.iter().zip(&voxel_index) {
            features[[0, x, y, z]] += 1.0;
            features[[1, x, y, z]] += point[2];
            features[[2, x, y, z]] += point[3];
        }
        for x in 0..gx {
            for y in 0..gy {
                for z in 0..gz {
                    let count = features[[0, x, y, z]];
                    if count > 0.0 {
                        features[[1, x, y, z]] /= count;
                        features[[2, x, y, z]] /= count;
                    }
                }
            }
        }

        Ok(ScanBatch {
            scan_id: scan_id.to_string(),
            cloud,
            voxel_index,
            features,
        })
    }

    fn grid_size(&self) -> [usize; 3] {
        self.grid
    }
}

type VoxelizerFactory = fn(&DatasetParams, &ModelParams) -> Result<Box<dyn Voxelizer>>;

/// Startup-time mapping from `dataset_type` strings to constructors.
pub struct VoxelizerRegistry {
    entries: Vec<(&'static str, VoxelizerFactory)>,
}

fn build_cartesian(dataset: &DatasetParams, model: &ModelParams) -> Result<Box<dyn Voxelizer>> {
    Ok(Box::new(CartesianVoxelizer::new(dataset, model)?))
}

impl Default for VoxelizerRegistry {
    fn default() -> Self {
        Self {
            entries: vec![("cartesian_voxel", build_cartesian)],
        }
    }
}

impl VoxelizerRegistry {
    pub fn resolve(
        &self,
        dataset: &DatasetParams,
        model: &ModelParams,
    ) -> Result<Box<dyn Voxelizer>> {
        let name = dataset.dataset_type.as_str();
        match self.entries.iter().find(|(n, _)| *n == name) {
            Some((_, factory)) => factory(dataset, model),
            None => Err(VoxsegError::config(
                "dataset_params",
                format!("unknown dataset_type {name:?}"),
            )),
        }
    }
}
