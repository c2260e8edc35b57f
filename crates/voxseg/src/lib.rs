//! voxseg: offline batch inference for voxel-based LiDAR semantic
//! segmentation.
//!
//! A scan's points are binned into a fixed voxel grid, a frozen model scores
//! every cell, and each point inherits its owning cell's argmax class,
//! remapped into the original benchmark taxonomy and written to disk as
//! packed 16-bit-masked labels.
//!
//! The pieces, leaves first:
//! - [`taxonomy`]: learning-space ↔ original-space label mapping.
//! - [`scan`]: packed point records, folder discovery, latest-chunk
//!   selection.
//! - [`voxelize`]: point-to-voxel adapter and its registry.
//! - [`model`]: frozen segmentation models, checkpoint policy, registry.
//! - [`project`]: per-voxel argmax back onto points, taxonomy remap,
//!   16-bit encoding.
//! - [`sink`]: per-scan `.label` files or aggregate `VSLB` containers.
//! - [`pipeline`]: the sequential per-scan orchestration.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod project;
pub mod scan;
pub mod sink;
pub mod taxonomy;
pub mod voxelize;

pub use config::InferConfig;
pub use error::{Result, VoxsegError};
pub use model::{ModelRegistry, PredictionVolume, SegmentationModel};
pub use pipeline::{Pipeline, ScanMode};
pub use project::{project as project_labels, LABEL_MASK};
pub use scan::{latest_chunk_files, PointCloud};
pub use sink::{AggregateSink, PerScanSink};
pub use taxonomy::LabelTaxonomy;
pub use voxelize::{ScanBatch, Voxelizer, VoxelizerRegistry};
