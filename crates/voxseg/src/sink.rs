//! Result sinks: persist per-scan label arrays.
//!
//! Per-scan mode writes one `.label` file per scan, named by a zero-padded
//! output-order counter. Aggregate mode collects arrays in memory and
//! serializes them once per input unit as a `VSLB` container.
//!
//! `.label` payload: packed little-endian u32, one value per point, in point
//! order. Only the low 16 bits carry label content.
//!
//! VSLB container layout (little-endian):
//!   00 : [u8;4] magic = b"VSLB"
//!   04 : u32    version = 1
//!   08 : u32    array count
//!   ..  : per array: u32 length, then `length` packed u32 labels

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VoxsegError};

pub const VSLB_MAGIC: [u8; 4] = *b"VSLB";
pub const VSLB_VERSION: u32 = 1;

/// Per-scan sink. The filename index counts processed scans starting at 0 —
/// it reflects output order, not input filenames, so downstream tools always
/// see contiguous `000000.label`, `000001.label`, ...
pub struct PerScanSink {
    save_dir: PathBuf,
    next_index: usize,
}

impl PerScanSink {
    pub fn new(save_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(save_dir).map_err(|e| VoxsegError::io(save_dir, e))?;
        Ok(Self {
            save_dir: save_dir.to_path_buf(),
            next_index: 0,
        })
    }

    /// Write one scan's labels and advance the counter.
    pub fn write(&mut self, labels: &[u32]) -> Result<PathBuf> {
        let path = self.save_dir.join(format!("{:06}.label", self.next_index));
        write_label_file(&path, labels)?;
        self.next_index += 1;
        Ok(path)
    }

    pub fn scans_written(&self) -> usize {
        self.next_index
    }
}

/// Aggregate sink for one chunk unit: arrays accumulate in order and are
/// serialized exactly once by `finish`.
#[derive(Default)]
pub struct AggregateSink {
    arrays: Vec<Vec<u32>>,
}

impl AggregateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, labels: Vec<u32>) {
        self.arrays.push(labels);
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Serialize everything collected so far to the unit's derived output
    /// path and return it.
    pub fn finish(self, unit_path: &Path) -> Result<PathBuf> {
        let out_path = labels_output_path(unit_path);
        let file = File::create(&out_path).map_err(|e| VoxsegError::io(&out_path, e))?;
        let mut w = BufWriter::new(file);

        let io = |e| VoxsegError::io(&out_path, e);
        w.write_all(&VSLB_MAGIC).map_err(io)?;
        w.write_all(&VSLB_VERSION.to_le_bytes()).map_err(io)?;
        w.write_all(&(self.arrays.len() as u32).to_le_bytes()).map_err(io)?;
        for labels in &self.arrays {
            w.write_all(&(labels.len() as u32).to_le_bytes()).map_err(io)?;
            for &label in labels {
                w.write_all(&label.to_le_bytes()).map_err(io)?;
            }
        }
        w.flush().map_err(io)?;
        Ok(out_path)
    }
}

/// Derive the aggregate output path from the input unit's path by
/// substituting the `raw` path segment with `labels`. Every occurrence is
/// substituted, matching the upstream convention.
pub fn labels_output_path(unit_path: &Path) -> PathBuf {
    PathBuf::from(unit_path.to_string_lossy().replace("raw", "labels"))
}

/// Write one `.label` payload: packed little-endian u32 in point order.
pub fn write_label_file(path: &Path, labels: &[u32]) -> Result<()> {
    let file = File::create(path).map_err(|e| VoxsegError::io(path, e))?;
    let mut w = BufWriter::new(file);
    for &label in labels {
        w.write_all(&label.to_le_bytes())
            .map_err(|e| VoxsegError::io(path, e))?;
    }
    w.flush().map_err(|e| VoxsegError::io(path, e))
}

/// Read a `.label` payload back. Used by tests and downstream checks.
pub fn read_label_file(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|e| VoxsegError::io(path, e))?;
    if bytes.len() % 4 != 0 {
        return Err(VoxsegError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated label payload"),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

#[inline]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> std::io::Result<&'a [u8]> {
    if buf.len() < n {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated VSLB container",
        ));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline]
fn le_u32(buf: &mut &[u8]) -> std::io::Result<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn parse_vslb_bytes(mut p: &[u8]) -> std::io::Result<Vec<Vec<u32>>> {
    let bad = |msg: &str| std::io::Error::new(std::io::ErrorKind::InvalidData, msg);

    if take(&mut p, 4)? != VSLB_MAGIC {
        return Err(bad("bad VSLB magic"));
    }
    if le_u32(&mut p)? != VSLB_VERSION {
        return Err(bad("unsupported VSLB version"));
    }
    let count = le_u32(&mut p)? as usize;

    let mut arrays = Vec::with_capacity(count);
    for _ in 0..count {
        let len = le_u32(&mut p)? as usize;
        let raw = take(&mut p, len.checked_mul(4).ok_or_else(|| bad("array size overflow"))?)?;
        arrays.push(
            raw.chunks_exact(4)
                .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        );
    }
    Ok(arrays)
}

/// Parse a VSLB container back into its label arrays.
pub fn read_label_container(path: &Path) -> Result<Vec<Vec<u32>>> {
    let bytes = std::fs::read(path).map_err(|e| VoxsegError::io(path, e))?;
    parse_vslb_bytes(&bytes).map_err(|e| VoxsegError::io(path, e))
}
