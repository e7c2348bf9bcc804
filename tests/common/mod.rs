// Shared test helpers for integration tests
#![allow(dead_code)]

use example_runner::dataset::{Dataset, DatasetCollection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use example_runner::models::{ExampleKind, Job};

pub const DATASET_SUFFIX: &str = ".dataset.json";

/// Builds a dataset from rows and labels, panicking on malformed input.
pub fn dataset(rows: &[&[f64]], labels: &[&str]) -> Dataset {
    Dataset::from_rows(
        "test",
        rows.iter().map(|row| row.to_vec()).collect(),
        None,
        labels.iter().map(|l| l.to_string()).collect(),
    )
    .expect("valid dataset")
}

/// A collection holding a single dataset named `name`.
pub fn collection(name: &str, ds: Dataset) -> DatasetCollection {
    let mut collection = DatasetCollection::new();
    collection.insert(name, ds);
    collection
}

/// Writes `collection` as a dataset file `file` in `dir`.
pub fn write_collection(dir: &Path, file: &str, collection: &DatasetCollection) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create dataset directory");
    let path = dir.join(file);
    collection.save(&path).expect("Failed to write dataset file");
    path
}

/// Creates an empty examples root.
pub fn examples_root() -> TempDir {
    tempdir().expect("Failed to create temporary directory")
}

/// Creates an example directory at `root/rel` with a marker file for its kind
/// and an optional `labels` file.
pub fn create_example(root: &Path, rel: &str, marker: &str, labels: Option<&str>) -> PathBuf {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).expect("Failed to create example directory");
    fs::write(dir.join(marker), "").expect("Failed to write marker file");
    if let Some(labels) = labels {
        fs::write(dir.join("labels"), labels).expect("Failed to write labels file");
    }
    dir
}

/// Writes `reference/time.dat` with the given number of seconds.
pub fn write_reference_time(dir: &Path, secs: f64) {
    let reference = dir.join("reference");
    fs::create_dir_all(&reference).expect("Failed to create reference directory");
    fs::write(reference.join("time.dat"), format!("{:.3}\n", secs)).expect("Failed to write time.dat");
}

/// A job that is not backed by any directory.
pub fn job(id: &str, secs: Option<f64>) -> Job {
    Job {
        id: id.to_string(),
        path: PathBuf::from(id),
        kind: ExampleKind::Xml,
        reference_duration: secs.map(Duration::from_secs_f64),
        may_fail: false,
        labels: vec!["nightly".to_string()],
    }
}

/// Writes an executable shell script, used as a fake simulation tool.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    let mut permissions = fs::metadata(path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).expect("Failed to make script executable");
}
