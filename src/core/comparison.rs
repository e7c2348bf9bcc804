//! # Comparison Engine / 比较引擎
//!
//! Compares the datasets produced by a run against the stored reference
//! datasets. Datasets are matched by name and compared column by column,
//! positionally.
//!
//! A sample violates the tolerance iff its absolute difference exceeds BOTH
//! `atol` AND `rtol * |reference|`. Two NaN values are equal; a finite value
//! never equals NaN; among the remaining non-finite pairs only identical
//! values (equal infinities) pass.
//!
//! Every failure is counted exactly. Only the first `max_failures` failures
//! get a [`DiffArtifact`] with the data needed to draw an overlay plot.
//!
//! 将运行产生的数据集与存储的参考数据集进行比较。数据集按名称匹配，并按位置逐列比较。
//! 当且仅当绝对差同时超过 `atol` 和 `rtol * |reference|` 时，采样违反容差。
//! 两个 NaN 相等；有限值永远不等于 NaN；其余非有限值对中只有相同的值（相等的无穷大）通过。
//! 每个失败都会被精确计数，只有前 `max_failures` 个失败会生成 [`DiffArtifact`]。

use serde::Serialize;

use crate::core::config::ToleranceConfig;
use crate::core::dataset::{Dataset, DatasetCollection, DatasetStore};

/// Returns `true` if the pair (`reference`, `current`) violates the tolerance.
/// 如果 (`reference`, `current`) 对违反容差，则返回 `true`。
pub fn sample_violates(reference: f64, current: f64, tolerance: &ToleranceConfig) -> bool {
    if reference.is_nan() && current.is_nan() {
        return false;
    }
    if !reference.is_finite() || !current.is_finite() {
        return reference != current;
    }
    let diff = (current - reference).abs();
    diff > tolerance.atol && diff > tolerance.rtol * reference.abs()
}

/// Verdict for the data of one column.
/// 单列数据的判定。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ColumnVerdict {
    Passed,
    /// At least one sample violates the tolerance.
    ToleranceViolation {
        first_index: usize,
        violations: usize,
        /// Largest absolute difference; infinite when a non-finite pair mismatched.
        max_abs_diff: f64,
    },
    /// Both sides have data but a different number of rows.
    RowCountMismatch {
        reference_rows: usize,
        current_rows: usize,
    },
    /// The current dataset has fewer columns than the reference.
    MissingColumn,
    /// The current dataset has a column the reference does not have.
    ExtraColumn,
    /// One side has no rows; counted as compared but not as failed.
    NoData,
}

impl ColumnVerdict {
    pub fn is_failure(&self) -> bool {
        !matches!(self, ColumnVerdict::Passed | ColumnVerdict::NoData)
    }
}

/// Result of one column of a dataset.
/// 数据集中一列的结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnResult {
    pub index: usize,
    pub reference_label: Option<String>,
    pub current_label: Option<String>,
    /// The labels at this index differ. Reported separately from the data verdict.
    /// 此索引处的标签不同。与数据判定分开报告。
    pub label_mismatch: bool,
    pub verdict: ColumnVerdict,
    /// `true` if a diff artifact was materialized for this column.
    pub has_artifact: bool,
}

impl ColumnResult {
    /// A column counts as one failure, however many ways it failed.
    /// 无论以多少种方式失败，一列只计为一次失败。
    pub fn failed(&self) -> bool {
        self.label_mismatch || self.verdict.is_failure()
    }
}

/// Result of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DatasetVerdict {
    Compared { columns: Vec<ColumnResult> },
    /// Present in the reference only.
    MissingInCurrent,
    /// Present in the current output only.
    MissingInReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetResult {
    pub file: String,
    pub dataset: String,
    pub verdict: DatasetVerdict,
}

/// File-level structural result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FileVerdict {
    MissingInCurrent,
    MissingInReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub file: String,
    pub verdict: FileVerdict,
}

/// Everything needed to draw an overlay of a failed column:
/// `(time, value)` pairs of both sides, time taken from column 0.
///
/// 绘制失败列叠加图所需的全部数据：双方的 `(time, value)` 对，时间取自第 0 列。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffArtifact {
    pub file: String,
    pub dataset: String,
    pub column: usize,
    pub label: Option<String>,
    pub reference: Vec<[f64; 2]>,
    pub current: Vec<[f64; 2]>,
}

impl DiffArtifact {
    fn new(file: &str, dataset: &str, column: usize, reference: &Dataset, current: &Dataset) -> Self {
        let series = |ds: &Dataset| -> Vec<[f64; 2]> {
            ds.column(0).zip(ds.column(column)).map(|(t, v)| [t, v]).collect()
        };
        Self {
            file: file.to_string(),
            dataset: dataset.to_string(),
            column,
            label: reference.label(column).map(str::to_string),
            reference: series(reference),
            current: series(current),
        }
    }
}

/// The result of comparing a run against its reference.
/// 将一次运行与其参考进行比较的结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    /// Number of compared items (columns plus structural entries).
    /// 比较项的数量（列加上结构性条目）。
    pub compared: usize,
    /// Number of failed items, exact even beyond the failure cap.
    /// 失败项的数量，即使超出失败上限也是精确的。
    pub failed: usize,
    pub files: Vec<FileResult>,
    pub datasets: Vec<DatasetResult>,
    /// Artifacts of the failures within the cap.
    #[serde(skip)]
    pub artifacts: Vec<DiffArtifact>,
}

impl ComparisonOutcome {
    pub fn passed(&self) -> bool {
        self.failed == 0
    }
}

/// Compares datasets with a fixed tolerance and failure cap.
/// Holds no state between calls.
///
/// 使用固定的容差和失败上限比较数据集。调用之间不保存状态。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    pub tolerance: ToleranceConfig,
    /// Failures beyond this count get no artifact; 0 means unlimited.
    pub max_failures: usize,
}

impl Comparator {
    pub fn new(tolerance: ToleranceConfig, max_failures: usize) -> Self {
        Self {
            tolerance,
            max_failures,
        }
    }

    /// Compares two collections, as if both came from a file named `file`.
    /// 比较两个集合，视为两者都来自名为 `file` 的文件。
    pub fn compare(
        &self,
        file: &str,
        reference: &DatasetCollection,
        current: &DatasetCollection,
    ) -> ComparisonOutcome {
        let mut builder = OutcomeBuilder::new(self);
        builder.compare_collections(file, reference, current);
        builder.finish()
    }

    /// Compares all files of two stores. The failure cap spans all files.
    /// 比较两个存储中的所有文件。失败上限覆盖所有文件。
    pub fn compare_stores(&self, reference: &DatasetStore, current: &DatasetStore) -> ComparisonOutcome {
        let mut builder = OutcomeBuilder::new(self);
        for file in reference.file_names() {
            match (reference.get(file), current.get(file)) {
                (Some(ref_collection), Some(cur_collection)) => {
                    builder.compare_collections(file, ref_collection, cur_collection);
                }
                _ => builder.file_failure(file, FileVerdict::MissingInCurrent),
            }
        }
        for file in current.file_names() {
            if reference.get(file).is_none() {
                builder.file_failure(file, FileVerdict::MissingInReference);
            }
        }
        builder.finish()
    }
}

struct OutcomeBuilder<'a> {
    comparator: &'a Comparator,
    outcome: ComparisonOutcome,
}

impl<'a> OutcomeBuilder<'a> {
    fn new(comparator: &'a Comparator) -> Self {
        Self {
            comparator,
            outcome: ComparisonOutcome::default(),
        }
    }

    fn finish(self) -> ComparisonOutcome {
        self.outcome
    }

    /// Records one compared item. Returns `true` if a failure is still within the cap.
    fn record(&mut self, failed: bool) -> bool {
        self.outcome.compared += 1;
        if !failed {
            return false;
        }
        self.outcome.failed += 1;
        self.comparator.max_failures == 0 || self.outcome.failed <= self.comparator.max_failures
    }

    fn file_failure(&mut self, file: &str, verdict: FileVerdict) {
        self.record(true);
        self.outcome.files.push(FileResult {
            file: file.to_string(),
            verdict,
        });
    }

    fn dataset_failure(&mut self, file: &str, dataset: &str, verdict: DatasetVerdict) {
        self.record(true);
        self.outcome.datasets.push(DatasetResult {
            file: file.to_string(),
            dataset: dataset.to_string(),
            verdict,
        });
    }

    fn compare_collections(&mut self, file: &str, reference: &DatasetCollection, current: &DatasetCollection) {
        for (name, ref_ds) in reference.iter() {
            match current.get(name) {
                Some(cur_ds) => {
                    let columns = self.compare_datasets(file, name, ref_ds, cur_ds);
                    self.outcome.datasets.push(DatasetResult {
                        file: file.to_string(),
                        dataset: name.to_string(),
                        verdict: DatasetVerdict::Compared { columns },
                    });
                }
                None => self.dataset_failure(file, name, DatasetVerdict::MissingInCurrent),
            }
        }
        for name in current.names() {
            if reference.get(name).is_none() {
                self.dataset_failure(file, name, DatasetVerdict::MissingInReference);
            }
        }
    }

    fn compare_datasets(
        &mut self,
        file: &str,
        dataset: &str,
        reference: &Dataset,
        current: &Dataset,
    ) -> Vec<ColumnResult> {
        let tolerance = self.comparator.tolerance;
        let mut results = Vec::with_capacity(reference.columns().max(current.columns()));

        for index in 0..reference.columns() {
            let reference_label = reference.label(index).map(str::to_string);
            let current_label = current.label(index).map(str::to_string);
            let present = index < current.columns();
            let verdict = if present {
                column_verdict(reference, current, index, &tolerance)
            } else {
                ColumnVerdict::MissingColumn
            };
            let mut result = ColumnResult {
                index,
                label_mismatch: present && reference_label != current_label,
                reference_label,
                current_label,
                verdict,
                has_artifact: false,
            };
            let within_cap = self.record(result.failed());
            // Only a data failure on both sides has something to plot.
            if within_cap
                && matches!(
                    result.verdict,
                    ColumnVerdict::ToleranceViolation { .. } | ColumnVerdict::RowCountMismatch { .. }
                )
            {
                self.outcome
                    .artifacts
                    .push(DiffArtifact::new(file, dataset, index, reference, current));
                result.has_artifact = true;
            }
            results.push(result);
        }

        for index in reference.columns()..current.columns() {
            self.record(true);
            results.push(ColumnResult {
                index,
                reference_label: None,
                current_label: current.label(index).map(str::to_string),
                label_mismatch: false,
                verdict: ColumnVerdict::ExtraColumn,
                has_artifact: false,
            });
        }
        results
    }
}

fn column_verdict(reference: &Dataset, current: &Dataset, index: usize, tolerance: &ToleranceConfig) -> ColumnVerdict {
    let (ref_rows, cur_rows) = (reference.rows(), current.rows());
    if ref_rows == 0 || cur_rows == 0 {
        return ColumnVerdict::NoData;
    }
    if ref_rows != cur_rows {
        return ColumnVerdict::RowCountMismatch {
            reference_rows: ref_rows,
            current_rows: cur_rows,
        };
    }

    let mut first_index = None;
    let mut violations = 0;
    let mut max_abs_diff = 0.0_f64;
    for (row, (r, c)) in reference.column(index).zip(current.column(index)).enumerate() {
        if !sample_violates(r, c, tolerance) {
            continue;
        }
        violations += 1;
        first_index.get_or_insert(row);
        let diff = if r.is_finite() && c.is_finite() {
            (c - r).abs()
        } else {
            f64::INFINITY
        };
        max_abs_diff = max_abs_diff.max(diff);
    }

    match first_index {
        None => ColumnVerdict::Passed,
        Some(first_index) => ColumnVerdict::ToleranceViolation {
            first_index,
            violations,
            max_abs_diff,
        },
    }
}
