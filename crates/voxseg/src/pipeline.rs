//! Orchestration: wires the taxonomy, voxelizer and model together and runs
//! scans through read → voxelize → infer → project → sink, strictly one scan
//! at a time.

use std::path::Path;

use log::info;

use crate::config::InferConfig;
use crate::error::Result;
use crate::model::{build_model, ModelRegistry, SegmentationModel};
use crate::project::project;
use crate::scan::{folder_scan_files, read_scan_file, PointCloud};
use crate::sink::{AggregateSink, PerScanSink};
use crate::taxonomy::LabelTaxonomy;
use crate::voxelize::{Voxelizer, VoxelizerRegistry};

/// Input discovery mode, passed explicitly through the call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// The input directory holds one scan file per scan; results go to
    /// individual `.label` files numbered in processing order.
    Folder,
    /// The input directory holds timestamped chunk files; only the latest
    /// chunk is processed and each chunk file yields one aggregate container.
    Chunked,
}

/// Everything needed to process scans. Immutable after construction and
/// shared read-only across the run.
pub struct Pipeline {
    taxonomy: LabelTaxonomy,
    voxelizer: Box<dyn Voxelizer>,
    model: Box<dyn SegmentationModel>,
}

impl Pipeline {
    /// Build the pipeline from configuration: load the taxonomy, resolve the
    /// voxelizer and model through their registries, apply the checkpoint
    /// policy. Any failure here aborts before a single scan is touched.
    pub fn from_config(config: &InferConfig) -> Result<Self> {
        let taxonomy = LabelTaxonomy::load(&config.dataset_params.label_mapping)?;
        info!(
            "taxonomy: {} learning-space labels",
            taxonomy.num_learning_labels()
        );

        let voxelizer =
            VoxelizerRegistry::default().resolve(&config.dataset_params, &config.model_params)?;
        let model = build_model(
            &ModelRegistry::default(),
            &config.model_params,
            &config.train_params,
        )?;

        Ok(Self {
            taxonomy,
            voxelizer,
            model,
        })
    }

    pub fn with_parts(
        taxonomy: LabelTaxonomy,
        voxelizer: Box<dyn Voxelizer>,
        model: Box<dyn SegmentationModel>,
    ) -> Self {
        Self {
            taxonomy,
            voxelizer,
            model,
        }
    }

    /// Run one scan end to end: voxelize, infer, back-project, encode.
    pub fn process_scan(&self, scan_id: &str, cloud: PointCloud) -> Result<Vec<u32>> {
        let point_count = cloud.len();
        let batch = self.voxelizer.voxelize(scan_id, cloud)?;
        let volume = self.model.forward(&batch)?;
        let labels = project(&volume, &batch.voxel_index, &self.taxonomy)?;
        info!("scan {scan_id}: {point_count} points labeled");
        Ok(labels)
    }

    /// Folder mode: every scan file under `dir`, one `.label` file each.
    /// Returns the number of scans processed.
    pub fn run_folder(&self, dir: &Path, sink: &mut PerScanSink) -> Result<usize> {
        let files = folder_scan_files(dir)?;
        info!("folder {}: {} scans", dir.display(), files.len());
        for file in &files {
            let cloud = read_scan_file(file)?;
            let labels = self.process_scan(&file.display().to_string(), cloud)?;
            sink.write(&labels)?;
        }
        Ok(files.len())
    }

    /// Chunk mode, one unit: process a single chunk file and serialize its
    /// aggregate container next to it (under the derived `labels` path).
    pub fn run_chunk_file(&self, chunk_path: &Path) -> Result<std::path::PathBuf> {
        let cloud = read_scan_file(chunk_path)?;
        let labels = self.process_scan(&chunk_path.display().to_string(), cloud)?;
        let mut sink = AggregateSink::new();
        sink.push(labels);
        sink.finish(chunk_path)
    }
}
