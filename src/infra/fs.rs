//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations on example
//! directories, such as cleaning previous outputs, writing files atomically,
//! unpacking FMUs and promoting current outputs to reference data.
//!
//! 此模块为示例目录提供文件系统操作的实用功能，
//! 如清理先前的输出、原子写入文件、解压 FMU 以及将当前输出提升为参考数据。

use anyhow::{Context, Result};
use fs_extra::file::{copy, CopyOptions};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the directory holding an example's reference data.
pub const REFERENCE_DIR: &str = "reference";

/// Name of the file holding the elapsed seconds of a run.
pub const TIME_FILE: &str = "time.dat";

/// Lists the regular files directly inside `dir` whose name ends with `suffix`, sorted.
/// A missing directory yields an empty list.
///
/// 列出 `dir` 中名称以 `suffix` 结尾的普通文件（已排序）。目录不存在时返回空列表。
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Removes the outputs of a previous run from an example directory:
/// `time.dat` and every current dataset file.
///
/// 从示例目录中删除上一次运行的输出：`time.dat` 和所有当前数据集文件。
pub fn clean_outputs(dir: &Path, dataset_suffix: &str) -> Result<()> {
    let time_file = dir.join(TIME_FILE);
    if time_file.exists() {
        fs::remove_file(&time_file)
            .with_context(|| format!("Failed to remove {}", time_file.display()))?;
    }
    for file in files_with_suffix(dir, dataset_suffix)? {
        fs::remove_file(&file).with_context(|| format!("Failed to remove {}", file.display()))?;
    }
    Ok(())
}

/// Writes `contents` to `path` through a temporary file in the same directory,
/// so readers never observe a partially written file.
///
/// 通过同一目录中的临时文件将 `contents` 写入 `path`，因此读取者永远不会看到部分写入的文件。
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".example_runner_")
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(contents)?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Copies the current dataset files and `time.dat` of an example into its
/// `reference` directory, overwriting older reference data.
/// Returns the number of copied files.
///
/// 将示例的当前数据集文件和 `time.dat` 复制到其 `reference` 目录中，覆盖旧的参考数据。
/// 返回复制的文件数量。
pub fn copy_to_reference(dir: &Path, dataset_suffix: &str) -> Result<usize> {
    let reference = dir.join(REFERENCE_DIR);
    fs::create_dir_all(&reference)
        .with_context(|| format!("Failed to create directory: {}", reference.display()))?;

    let mut sources = files_with_suffix(dir, dataset_suffix)?;
    let time_file = dir.join(TIME_FILE);
    if time_file.is_file() {
        sources.push(time_file);
    }

    let mut options = CopyOptions::new();
    options.overwrite = true;
    for source in &sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        copy(source, reference.join(name), &options)
            .with_context(|| format!("Failed to copy {} to reference", source.display()))?;
    }
    Ok(sources.len())
}

/// Unpacks the zip archive `archive` (e.g. an FMU) into `target`, creating it.
/// 将 zip 归档 `archive`（例如 FMU）解压到 `target` 中，并创建该目录。
pub fn extract_zip(archive: &Path, target: &Path) -> Result<()> {
    let file = fs::File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", archive.display()))?;
    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create directory: {}", target.display()))?;
    zip.extract(target)
        .with_context(|| format!("Failed to unpack {} into {}", archive.display(), target.display()))?;
    Ok(())
}

/// Gets the absolute path from a potentially relative path.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}
