//! End-to-end runs over real files in a temp directory: config and taxonomy
//! resources, packed scan files, checkpoint, both sink modes.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use voxseg::scan::latest_chunk_files;
use voxseg::sink::{labels_output_path, read_label_container, read_label_file};
use voxseg::{InferConfig, PerScanSink, Pipeline};

fn write_points(path: &Path, points: &[[f32; 4]]) {
    let mut f = File::create(path).unwrap();
    for p in points {
        for v in p {
            f.write_all(&v.to_le_bytes()).unwrap();
        }
    }
}

/// Checkpoint whose class-1 row responds to occupancy: every occupied voxel
/// argmaxes to class 1, empty voxels stay at class 0.
fn write_checkpoint(path: &Path, num_class: usize, fea_dim: usize) {
    let mut weight = vec![0.0f32; num_class * fea_dim];
    weight[fea_dim] = 1.0;
    let snapshot = serde_json::json!({
        "parameters": {
            "weight": { "rows": num_class, "cols": fea_dim, "data": weight },
            "bias": { "rows": 1, "cols": num_class, "data": vec![0.0f32; num_class] }
        }
    });
    std::fs::write(path, snapshot.to_string()).unwrap();
}

fn write_resources(dir: &Path) -> PathBuf {
    let mapping_path = dir.join("mapping.json");
    std::fs::write(
        &mapping_path,
        r#"{"learning_map_inv": {"0": 0, "1": 10, "2": 20}}"#,
    )
    .unwrap();

    let checkpoint_path = dir.join("checkpoint.json");
    write_checkpoint(&checkpoint_path, 3, 3);

    let config_path = dir.join("config.json");
    let config = serde_json::json!({
        "dataset_params": {
            "label_mapping": mapping_path,
            "dataset_type": "cartesian_voxel",
            "fixed_volume_space": true,
            "min_volume_space": [0.0, 0.0, 0.0],
            "max_volume_space": [4.0, 4.0, 2.0],
            "ignore_label": 0
        },
        "model_params": {
            "model_architecture": "voxel_linear",
            "output_shape": [4, 4, 2],
            "num_class": 3,
            "fea_dim": 3
        },
        "train_params": {
            "model_load_path": checkpoint_path,
            "allow_missing_checkpoint": false
        }
    });
    std::fs::write(&config_path, config.to_string()).unwrap();
    config_path
}

#[test]
fn three_points_in_one_voxel_get_the_remapped_voxel_class() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_resources(dir.path());

    let scans = dir.path().join("scans");
    std::fs::create_dir_all(&scans).unwrap();
    // All three points land in voxel (0, 0, 0) of the 4x4x2 grid.
    write_points(
        &scans.join("000000.bin"),
        &[
            [0.1, 0.1, 0.1, 0.5],
            [0.2, 0.2, 0.2, 0.5],
            [0.3, 0.3, 0.3, 0.5],
        ],
    );

    let config = InferConfig::load(&config_path).unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();

    let out = dir.path().join("out");
    let mut sink = PerScanSink::new(&out).unwrap();
    let processed = pipeline.run_folder(&scans, &mut sink).unwrap();
    assert_eq!(processed, 1);

    let labels = read_label_file(&out.join("000000.label")).unwrap();
    assert_eq!(labels, vec![10, 10, 10]);
}

#[test]
fn folder_run_numbers_outputs_sequentially_and_masks_labels() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_resources(dir.path());

    let scans = dir.path().join("scans");
    std::fs::create_dir_all(&scans).unwrap();
    // Input filenames deliberately non-contiguous; output numbering must not
    // follow them.
    write_points(&scans.join("000007.bin"), &[[0.5, 0.5, 0.5, 0.1]]);
    write_points(
        &scans.join("000042.bin"),
        &[[3.5, 3.5, 1.5, 0.2], [1.5, 1.5, 0.5, 0.3]],
    );

    let config = InferConfig::load(&config_path).unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();

    let out = dir.path().join("out");
    let mut sink = PerScanSink::new(&out).unwrap();
    let processed = pipeline.run_folder(&scans, &mut sink).unwrap();
    assert_eq!(processed, 2);

    let first = read_label_file(&out.join("000000.label")).unwrap();
    let second = read_label_file(&out.join("000001.label")).unwrap();
    assert!(!out.join("000002.label").exists());
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    for &label in first.iter().chain(second.iter()) {
        assert_eq!(label >> 16, 0);
    }
}

#[test]
fn identical_inputs_produce_bit_identical_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_resources(dir.path());

    let scans = dir.path().join("scans");
    std::fs::create_dir_all(&scans).unwrap();
    write_points(
        &scans.join("000000.bin"),
        &[[0.1, 0.1, 0.1, 0.5], [2.7, 3.1, 1.9, 0.8], [1.0, 1.0, 1.0, 0.0]],
    );

    let config = InferConfig::load(&config_path).unwrap();

    let mut outputs = Vec::new();
    for run in 0..2 {
        let pipeline = Pipeline::from_config(&config).unwrap();
        let out = dir.path().join(format!("out{run}"));
        let mut sink = PerScanSink::new(&out).unwrap();
        pipeline.run_folder(&scans, &mut sink).unwrap();
        outputs.push(std::fs::read(out.join("000000.label")).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn chunked_run_selects_latest_chunk_and_writes_containers() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_resources(dir.path());

    let raw = dir.path().join("data").join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::create_dir_all(dir.path().join("data").join("labels")).unwrap();

    write_points(
        &raw.join("raw_chunk_20230101_000.bin"),
        &[[9.9, 9.9, 9.9, 0.0]],
    );
    write_points(
        &raw.join("raw_chunk_20230102_000.bin"),
        &[[0.1, 0.1, 0.1, 0.5], [0.2, 0.2, 0.2, 0.5]],
    );

    let files = latest_chunk_files(&raw, "raw_chunk", ".bin").unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().contains("20230102"));

    let config = InferConfig::load(&config_path).unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();

    let out_path = pipeline.run_chunk_file(&files[0]).unwrap();
    assert_eq!(out_path, labels_output_path(&files[0]));

    let arrays = read_label_container(&out_path).unwrap();
    assert_eq!(arrays, vec![vec![10, 10]]);
}
