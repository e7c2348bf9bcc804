//! # Compare Command Module / 比较命令模块
//!
//! Compares two dataset files, or two directories of dataset files, outside of
//! a run. Exits with an error if any item fails.
//!
//! 在运行之外比较两个数据集文件或两个数据集文件目录。任何项失败时以错误退出。

use anyhow::{Context, Result};
use std::path::Path;

use super::{load_settings, ConfigOverrides, ConfigSource};
use crate::core::comparison::{Comparator, ComparisonOutcome};
use crate::core::config::ToleranceConfig;
use crate::core::dataset::{DatasetCollection, DatasetStore};
use crate::infra::t;
use crate::reporting::console::print_comparison_outcome;

pub fn execute(
    source: &ConfigSource,
    overrides: ConfigOverrides,
    reference: &Path,
    current: &Path,
) -> Result<()> {
    let config = load_settings(source, overrides)?;
    let comparator = Comparator::new(
        ToleranceConfig::new(config.atol, config.rtol)?,
        config.max_compare_failure,
    );

    let outcome = compare_paths(&comparator, reference, current, &config.dataset_suffix)?;
    print_comparison_outcome(&outcome, &config.language);
    if !outcome.passed() {
        anyhow::bail!(t!("compare.failed", locale = &config.language, count = outcome.failed).to_string());
    }
    Ok(())
}

/// Compares two files or two directories.
/// 比较两个文件或两个目录。
pub fn compare_paths(
    comparator: &Comparator,
    reference: &Path,
    current: &Path,
    dataset_suffix: &str,
) -> Result<ComparisonOutcome> {
    match (reference.is_dir(), current.is_dir()) {
        (true, true) => {
            let reference = DatasetStore::load_dir(reference, dataset_suffix)?;
            let current = DatasetStore::load_dir(current, dataset_suffix)?;
            Ok(comparator.compare_stores(&reference, &current))
        }
        (false, false) => {
            let file = current
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let reference = DatasetCollection::load(reference)?;
            let current = DatasetCollection::load(current)?;
            Ok(comparator.compare(&file, &reference, &current))
        }
        _ => Err(anyhow::anyhow!(
            "Cannot compare a file with a directory: {} vs {}",
            reference.display(),
            current.display()
        ))
        .context(t!("compare.mixed_inputs").to_string()),
    }
}
