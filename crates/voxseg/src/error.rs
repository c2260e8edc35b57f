use std::path::PathBuf;
use thiserror::Error;

/// Library-wide error type.
///
/// Every failure carries enough context (path, scan identifier, offending
/// label or voxel coordinates) for the operator to diagnose and rerun the
/// job. Nothing is swallowed or downgraded to a sentinel value.
#[derive(Debug, Error)]
pub enum VoxsegError {
    /// Malformed configuration or label-mapping resource, or a required key
    /// is absent. Fatal at startup, before any scan is processed.
    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// The model emitted a learning-space label that has no entry in
    /// `learning_map_inv`. Remapping it to a sentinel would silently corrupt
    /// the output, so this is fatal instead.
    #[error("learning-space label {label} has no inverse mapping")]
    UnknownLabel { label: usize },

    /// Chunk-mode enumeration found no matching input files.
    #[error("no files matching {prefix}_*{suffix} in {dir}")]
    NoDataFound {
        dir: PathBuf,
        prefix: String,
        suffix: String,
    },

    /// Checkpoint file missing or unreadable, and the configuration does not
    /// allow falling back to default-initialized parameters.
    #[error("checkpoint {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    /// A per-point voxel index fell outside the prediction volume. The
    /// adapter must guarantee in-bounds indices; the projector never clamps.
    #[error("point {point}: voxel index {index:?} outside grid {grid:?}")]
    IndexOutOfRange {
        point: usize,
        index: [usize; 3],
        grid: [usize; 3],
    },

    /// Malformed scan data (truncated record block, unreadable file).
    #[error("scan {scan}: {message}")]
    Scan { scan: String, message: String },

    /// Output write failure. The run aborts; partial output would be
    /// silently incomplete for benchmarking.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VoxsegError>;

impl VoxsegError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VoxsegError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        VoxsegError::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn scan(scan: impl Into<String>, message: impl Into<String>) -> Self {
        VoxsegError::Scan {
            scan: scan.into(),
            message: message.into(),
        }
    }
}
