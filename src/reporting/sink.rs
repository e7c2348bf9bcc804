//! # Result Sink Module / 结果接收器模块
//!
//! Persists every job outcome as one JSON line in `<report_dir>/results.jsonl`
//! and writes the diff artifacts of failed columns next to the job's captured
//! output, so plots can be drawn without rerunning the comparison.
//!
//! 将每个任务结果作为一行 JSON 持久化到 `<report_dir>/results.jsonl`，
//! 并将失败列的差异产物写在任务捕获的输出旁边，以便无需重新比较即可绘图。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::comparison::DiffArtifact;
use crate::core::models::{ComparisonState, ExampleKind, ExitState, JobOutcome, Verdict};
use crate::infra::fs::write_atomic;

/// Name of the JSON-lines file in the report directory.
pub const RESULTS_FILE: &str = "results.jsonl";

/// One line of `results.jsonl`.
#[derive(Debug, Serialize)]
pub struct ResultRecord<'a> {
    pub id: &'a str,
    pub kind: ExampleKind,
    pub labels: &'a [String],
    pub may_fail: bool,
    #[serde(flatten)]
    pub verdict: &'a Verdict,
    pub status: Option<ExitState>,
    pub elapsed_secs: Option<f64>,
    pub comparison: Option<&'a ComparisonState>,
    pub deprecated_warnings: usize,
    pub diff_files: Vec<PathBuf>,
    pub finished_at: DateTime<Local>,
}

/// Appends job outcomes to the result file of a run. Owned by the consumer
/// of the completion stream, so records are never interleaved.
///
/// 将任务结果追加到一次运行的结果文件中。由完成流的消费者拥有，因此记录不会交错。
pub struct ResultSink {
    report_dir: PathBuf,
    writer: BufWriter<File>,
}

impl ResultSink {
    /// Creates `report_dir` and starts a fresh `results.jsonl` in it.
    /// 创建 `report_dir` 并在其中开始一个新的 `results.jsonl`。
    pub fn create(report_dir: &Path) -> Result<Self> {
        fs::create_dir_all(report_dir)
            .with_context(|| format!("Failed to create report directory: {}", report_dir.display()))?;
        let path = report_dir.join(RESULTS_FILE);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create result file: {}", path.display()))?;
        Ok(Self {
            report_dir: report_dir.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn results_path(&self) -> PathBuf {
        self.report_dir.join(RESULTS_FILE)
    }

    /// Writes the diff artifacts of `outcome` and appends its record.
    /// 写入 `outcome` 的差异产物并追加其记录。
    pub fn record(&mut self, outcome: &JobOutcome) -> Result<()> {
        let report = outcome.report.as_ref();
        let diff_files = match report.map(|r| &r.comparison) {
            Some(ComparisonState::Compared { outcome: cmp }) if !cmp.artifacts.is_empty() => {
                write_artifacts(&self.report_dir.join(&outcome.job.id), &cmp.artifacts)?
            }
            _ => Vec::new(),
        };
        let execution = report.and_then(|r| r.execution.as_ref());

        let record = ResultRecord {
            id: &outcome.job.id,
            kind: outcome.job.kind,
            labels: &outcome.job.labels,
            may_fail: outcome.job.may_fail,
            verdict: &outcome.verdict,
            status: execution.map(|e| e.status),
            elapsed_secs: execution.map(|e| e.elapsed.as_secs_f64()),
            comparison: report.map(|r| &r.comparison),
            deprecated_warnings: report.map(|r| r.deprecated_warnings).unwrap_or(0),
            diff_files,
            finished_at: Local::now(),
        };
        let line = serde_json::to_string(&record).context("Failed to serialize result record")?;
        writeln!(self.writer, "{}", line).context("Failed to append result record")?;
        self.writer.flush().context("Failed to flush result file")?;
        tracing::debug!(job = %outcome.job.id, "result recorded");
        Ok(())
    }
}

/// Writes each artifact as `diff_<n>.json` into `dir` and returns the paths.
/// 将每个产物以 `diff_<n>.json` 写入 `dir` 并返回路径。
pub fn write_artifacts(dir: &Path, artifacts: &[DiffArtifact]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    artifacts
        .iter()
        .enumerate()
        .map(|(i, artifact)| {
            let path = dir.join(format!("diff_{:03}.json", i + 1));
            let json = serde_json::to_vec(artifact).context("Failed to serialize diff artifact")?;
            write_atomic(&path, &json)?;
            Ok(path)
        })
        .collect()
}
