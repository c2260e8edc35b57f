//! Scan input: packed point records on disk, folder discovery, and
//! latest-chunk selection for streaming input.
//!
//! Scan file layout (little-endian): a tightly packed sequence of 16-byte
//! records, `f32 x, f32 y, f32 z, f32 reflectance` per point, no header.
//! A file whose length is not a multiple of 16 is malformed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, VoxsegError};

pub const POINT_RECORD_BYTES: usize = 16;

/// One LiDAR scan: `[x, y, z, reflectance]` per point, input order preserved.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<[f32; 4]>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Decode packed point records from a contiguous byte slice. This is the
/// single source of truth for the record layout.
pub fn parse_point_records(scan_id: &str, bytes: &[u8]) -> Result<PointCloud> {
    if bytes.len() % POINT_RECORD_BYTES != 0 {
        return Err(VoxsegError::scan(
            scan_id,
            format!(
                "truncated point block: {} bytes is not a multiple of {}",
                bytes.len(),
                POINT_RECORD_BYTES
            ),
        ));
    }

    #[cfg(target_endian = "little")]
    {
        // Fast path: reinterpret the packed block in place. Falls back to the
        // portable decode if the allocation happens to be misaligned for f32.
        if let Ok(records) = bytemuck::try_cast_slice::<u8, [f32; 4]>(bytes) {
            return Ok(PointCloud {
                points: records.to_vec(),
            });
        }
    }

    let mut points = Vec::with_capacity(bytes.len() / POINT_RECORD_BYTES);
    for record in bytes.chunks_exact(POINT_RECORD_BYTES) {
        points.push([
            f32::from_le_bytes(record[0..4].try_into().unwrap()),
            f32::from_le_bytes(record[4..8].try_into().unwrap()),
            f32::from_le_bytes(record[8..12].try_into().unwrap()),
            f32::from_le_bytes(record[12..16].try_into().unwrap()),
        ]);
    }
    Ok(PointCloud { points })
}

/// Read one scan file into memory.
pub fn read_scan_file(path: &Path) -> Result<PointCloud> {
    let bytes = std::fs::read(path).map_err(|e| VoxsegError::io(path, e))?;
    parse_point_records(&path.display().to_string(), &bytes)
}

/// Folder mode: every `.bin` scan under `dir`, sorted by path so processing
/// order is stable across runs.
pub fn folder_scan_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|s| s.eq_ignore_ascii_case("bin"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Chunk mode: select the most recent batch of chunk files.
///
/// Files are named `<prefix>_<timestamp>_*<suffix>`; the timestamp is the
/// first `_`-separated token after the prefix. Files are grouped by
/// timestamp and only the group with the lexicographically maximal timestamp
/// is returned, sorted. Comparison is on strings, not numbers: callers must
/// keep timestamps fixed-width (zero-padded) for "maximal" to mean "latest".
pub fn latest_chunk_files(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>> {
    let lead = format!("{prefix}_");
    let mut matched: Vec<(String, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(|e| VoxsegError::io(dir, e))? {
        let entry = entry.map_err(|e| VoxsegError::io(dir, e))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(suffix) {
            continue;
        }
        let Some(rest) = name.strip_prefix(&lead) else {
            continue;
        };
        let Some(timestamp) = rest.split('_').next().filter(|t| !t.is_empty()) else {
            continue;
        };
        matched.push((timestamp.to_string(), entry.path()));
    }

    let timestamps: BTreeSet<&str> = matched.iter().map(|(t, _)| t.as_str()).collect();
    let Some(latest) = timestamps.into_iter().next_back() else {
        return Err(VoxsegError::NoDataFound {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        });
    };
    let latest = latest.to_string();

    let mut files: Vec<PathBuf> = matched
        .into_iter()
        .filter(|(t, _)| *t == latest)
        .map(|(_, p)| p)
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_points(path: &Path, points: &[[f32; 4]]) {
        let mut f = File::create(path).unwrap();
        for p in points {
            for v in p {
                f.write_all(&v.to_le_bytes()).unwrap();
            }
        }
    }

    #[test]
    fn reads_packed_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000000.bin");
        let points = [[1.0, 2.0, 3.0, 0.5], [-4.0, 0.0, 1.5, 0.9]];
        write_points(&path, &points);

        let cloud = read_scan_file(&path).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points[0], points[0]);
        assert_eq!(cloud.points[1], points[1]);
    }

    #[test]
    fn truncated_record_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, [0u8; 17]).unwrap();
        assert!(matches!(
            read_scan_file(&path),
            Err(VoxsegError::Scan { .. })
        ));
    }

    #[test]
    fn folder_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["000002.bin", "000000.bin", "notes.txt", "000001.bin"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let files = folder_scan_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["000000.bin", "000001.bin", "000002.bin"]);
    }

    #[test]
    fn latest_chunk_wins_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "raw_chunk_20230101_000.bin",
            "raw_chunk_20230101_001.bin",
            "raw_chunk_20230102_000.bin",
            "raw_chunk_20230102_001.bin",
            "other_20230103_000.bin",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }

        let files = latest_chunk_files(dir.path(), "raw_chunk", ".bin").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            ["raw_chunk_20230102_000.bin", "raw_chunk_20230102_001.bin"]
        );
    }

    #[test]
    fn empty_dir_is_no_data_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            latest_chunk_files(dir.path(), "raw_chunk", ".bin"),
            Err(VoxsegError::NoDataFound { .. })
        ));
    }
}
