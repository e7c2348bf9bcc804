//! # Example Discovery Module / 示例发现模块
//!
//! Walks directory trees and turns every example directory into a [`Job`].
//! An example is recognised by its project files; its kind, labels and
//! reference duration are read from the directory.
//!
//! 遍历目录树，并将每个示例目录转换为一个 [`Job`]。
//! 示例通过其项目文件识别；其类型、标签和参考时长从目录中读取。

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::core::config::FilterConfig;
use crate::core::models::{ExampleKind, Job};
use crate::infra::fs::{REFERENCE_DIR, TIME_FILE};

/// Label given to examples without a `labels` file.
pub const DEFAULT_LABEL: &str = "nightly";

/// Label marking an example whose failure does not fail the run.
pub const MAY_FAIL_LABEL: &str = "willfail";

/// Directories that never contain examples.
const SKIPPED_DIRS: &[&str] = &["tmp_fmuCheck", "tmp_mbsimTestFMU", REFERENCE_DIR];

/// Detects the kind of the example in `dir`, `None` if it is not an example.
/// 检测 `dir` 中示例的类型；如果不是示例，则返回 `None`。
pub fn detect_kind(dir: &Path) -> Option<ExampleKind> {
    let has = |name: &str| dir.join(name).is_file();
    if has("Makefile") {
        Some(ExampleKind::Compiled)
    } else if has("MBS.mbsimprj.xml") || has("MBS.mbsimprj.alpha_py.xml") {
        Some(ExampleKind::Xml)
    } else if has("MBS.mbsimprj.flat.xml") {
        Some(ExampleKind::FlatXml)
    } else if has("FMI.mbsimprj.xml") || has("FMI_cosim.mbsimprj.xml") {
        Some(ExampleKind::FmiXml {
            cosim: !has("FMI.mbsimprj.xml"),
        })
    } else if has("Makefile_FMI") || has("Makefile_FMI_cosim") {
        Some(ExampleKind::FmiSource {
            cosim: !has("Makefile_FMI"),
        })
    } else {
        None
    }
}

/// Reads the space separated `labels` file of an example.
/// Without such a file the example carries the default label.
///
/// 读取示例中以空格分隔的 `labels` 文件。没有该文件时，示例带有默认标签。
pub fn read_labels(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join("labels");
    if !path.is_file() {
        return Ok(vec![DEFAULT_LABEL.to_string()]);
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read labels file: {}", path.display()))?;
    Ok(content.split_whitespace().map(str::to_string).collect())
}

/// Reads `reference/time.dat`; a missing or unreadable value means unknown.
/// 读取 `reference/time.dat`；缺失或无法读取的值表示未知。
pub fn read_reference_duration(dir: &Path) -> Option<Duration> {
    let content = fs::read_to_string(dir.join(REFERENCE_DIR).join(TIME_FILE)).ok()?;
    let secs: f64 = content.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Creates the job for the example directory `dir` below `root`.
pub fn load_job(root: &Path, dir: &Path) -> Result<Option<Job>> {
    let Some(kind) = detect_kind(dir) else {
        return Ok(None);
    };
    let labels = read_labels(dir)?;
    Ok(Some(Job {
        id: job_id(root, dir),
        path: dir.to_path_buf(),
        kind,
        reference_duration: read_reference_duration(dir),
        may_fail: labels.iter().any(|l| l == MAY_FAIL_LABEL),
        labels,
    }))
}

/// Discovers the examples selected by `selections`, relative to `root`.
///
/// Each selection is a directory walked recursively. A selection prefixed
/// with `^` removes the examples below that directory from the set collected
/// so far. No selection means the whole `root`.
///
/// 发现 `selections` 选择的示例（相对于 `root`）。每个选择都是一个递归遍历的目录。
/// 以 `^` 为前缀的选择会从目前收集的集合中删除该目录下的示例。没有选择表示整个 `root`。
pub fn discover(root: &Path, selections: &[String]) -> Result<Vec<Job>> {
    let root = normalize(root);
    let mut found: BTreeMap<PathBuf, Job> = BTreeMap::new();
    let default = [String::from(".")];
    let selections = if selections.is_empty() {
        &default[..]
    } else {
        selections
    };

    for selection in selections {
        let (remove, dir) = match selection.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, selection.as_str()),
        };
        let base = normalize(&root.join(dir));
        if !base.is_dir() {
            anyhow::bail!("Example directory not found: {}", base.display());
        }
        if remove {
            found.retain(|path, _| !path.starts_with(&base));
            continue;
        }
        let mut dirs = Vec::new();
        collect_example_dirs(&base, &mut dirs)?;
        for dir in dirs {
            if let Some(job) = load_job(&root, &dir)? {
                found.insert(dir, job);
            }
        }
    }
    Ok(found.into_values().collect())
}

/// Splits jobs into the accepted ones and the number rejected by `filter`.
/// 将任务拆分为被接受的任务和被 `filter` 拒绝的数量。
pub fn apply_filter(jobs: Vec<Job>, filter: &FilterConfig) -> (Vec<Job>, usize) {
    let total = jobs.len();
    let accepted: Vec<Job> = jobs
        .into_iter()
        .filter(|job| filter.accepts(job.kind, &job.labels))
        .collect();
    let rejected = total - accepted.len();
    (accepted, rejected)
}

fn collect_example_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if detect_kind(dir).is_some() {
        out.push(dir.to_path_buf());
    }
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && !is_skipped(path))
        .collect();
    children.sort();
    for child in children {
        collect_example_dirs(&child, out)?;
    }
    Ok(())
}

fn is_skipped(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.') || SKIPPED_DIRS.contains(&name))
}

/// Identifier of an example: its path relative to `root` with `/` separators.
fn job_id(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Removes `.` and resolves `..` lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
