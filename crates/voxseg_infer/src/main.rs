use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::fs;
use std::path::PathBuf;

use voxseg::scan::latest_chunk_files;
use voxseg::sink::labels_output_path;
use voxseg::{InferConfig, PerScanSink, Pipeline, ScanMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// One dataset folder of scan files; one `.label` file per scan.
    Folder,
    /// Timestamped chunk files; only the latest chunk is processed and each
    /// chunk file yields one aggregate label container.
    Chunked,
}

impl From<Mode> for ScanMode {
    fn from(mode: Mode) -> ScanMode {
        match mode {
            Mode::Folder => ScanMode::Folder,
            Mode::Chunked => ScanMode::Chunked,
        }
    }
}

/// `voxseg_infer` - offline batch inference over LiDAR scans.
///
/// Loads a frozen segmentation model, bins each scan into a voxel grid,
/// scores every cell, and writes one original-taxonomy label per point.
#[derive(Parser, Debug)]
#[command(name = "voxseg_infer", version)]
struct Args {
    /// Path to the inference configuration resource.
    #[arg(short = 'y', long = "config_path", default_value = "config/semantickitti.json")]
    config_path: PathBuf,

    /// Path to the folder containing input lidar scans.
    #[arg(long = "demo-folder", required = true)]
    demo_folder: PathBuf,

    /// Where to write per-scan `.label` files (folder mode only).
    #[arg(long = "save-folder")]
    save_folder: Option<PathBuf>,

    /// Input discovery mode.
    #[arg(long, value_enum, default_value_t = Mode::Folder)]
    mode: Mode,

    /// Chunk filename prefix (chunked mode).
    #[arg(long, default_value = "raw_chunk")]
    chunk_prefix: String,

    /// Chunk filename suffix (chunked mode).
    #[arg(long, default_value = ".bin")]
    chunk_suffix: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = InferConfig::load(&args.config_path)
        .with_context(|| format!("loading config {}", args.config_path.display()))?;
    let pipeline = Pipeline::from_config(&config).context("startup")?;

    match ScanMode::from(args.mode) {
        ScanMode::Folder => {
            let Some(save_folder) = args.save_folder.as_deref() else {
                bail!("--save-folder is required in folder mode");
            };
            let mut sink = PerScanSink::new(save_folder)?;
            let processed = pipeline
                .run_folder(&args.demo_folder, &mut sink)
                .with_context(|| format!("processing folder {}", args.demo_folder.display()))?;
            info!(
                "done: {processed} scans -> {}",
                save_folder.display()
            );
        }
        ScanMode::Chunked => {
            let files =
                latest_chunk_files(&args.demo_folder, &args.chunk_prefix, &args.chunk_suffix)?;
            info!("latest chunk: {} files", files.len());
            for file in &files {
                info!("processing {}", file.display());
                if let Some(parent) = labels_output_path(file).parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                let out = pipeline
                    .run_chunk_file(file)
                    .with_context(|| format!("processing chunk {}", file.display()))?;
                info!("wrote {}", out.display());
            }
        }
    }

    Ok(())
}
