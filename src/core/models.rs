//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the example runner:
//! jobs, execution results, per-job reports and the final verdicts that are
//! handed to the console and the result sink.
//!
//! 此模块定义了整个示例运行器中使用的核心数据结构：
//! 任务、执行结果、每个任务的报告以及交给控制台和结果接收器的最终判定。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use crate::core::comparison::ComparisonOutcome;
use crate::infra::t;

/// The execution path of an example, detected from the files it contains.
/// 示例的执行路径，根据其包含的文件检测。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExampleKind {
    /// `make` builds a `main` executable which is then run.
    /// `make` 构建一个 `main` 可执行文件，然后运行它。
    Compiled,
    /// An XML project run through the preprocessing XML simulator.
    /// 通过预处理 XML 仿真器运行的 XML 项目。
    Xml,
    /// An already flattened XML project run without preprocessing.
    /// 无需预处理即可运行的已展平 XML 项目。
    FlatXml,
    /// An XML project exported to an FMU and checked.
    /// 导出为 FMU 并进行检查的 XML 项目。
    FmiXml { cosim: bool },
    /// A compiled model library exported to an FMU and checked.
    /// 导出为 FMU 并进行检查的已编译模型库。
    FmiSource { cosim: bool },
}

impl ExampleKind {
    /// The short name used in filters, listings and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExampleKind::Compiled => "compiled",
            ExampleKind::Xml => "xml",
            ExampleKind::FlatXml => "flat-xml",
            ExampleKind::FmiXml { .. } => "fmi-xml",
            ExampleKind::FmiSource { .. } => "fmi-source",
        }
    }

    pub fn is_fmi(&self) -> bool {
        matches!(self, ExampleKind::FmiXml { .. } | ExampleKind::FmiSource { .. })
    }
}

impl fmt::Display for ExampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single example to execute. Immutable while the job runs.
/// 要执行的单个示例。任务运行期间不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Path of the example relative to the examples root; unique within a run.
    /// 示例相对于示例根目录的路径；在一次运行中唯一。
    pub id: String,
    /// Absolute path of the example directory / 示例目录的绝对路径
    pub path: PathBuf,
    pub kind: ExampleKind,
    /// Duration of the reference run, `None` if unknown.
    /// 参考运行的持续时间，未知时为 `None`。
    pub reference_duration: Option<Duration>,
    /// A failure of this job does not fail the overall run.
    /// 此任务的失败不会导致整体运行失败。
    pub may_fail: bool,
    pub labels: Vec<String>,
}

/// How a spawned process ended.
/// 派生进程的结束方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ExitState {
    Success,
    /// Nonzero exit. On Unix a process killed by signal `N` reports `-N`.
    /// 非零退出。在 Unix 上被信号 `N` 终止的进程报告 `-N`。
    Failed { code: Option<i32> },
    /// The wall-clock limit expired. Never carries an exit code.
    /// 超出时间限制。从不携带退出码。
    TimedOut,
}

impl ExitState {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return ExitState::Success;
        }
        let code = status.code().or_else(|| signal_code(&status));
        ExitState::Failed { code }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitState::Success)
    }
}

#[cfg(unix)]
fn signal_code(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|s| -s)
}

#[cfg(not(unix))]
fn signal_code(_status: &ExitStatus) -> Option<i32> {
    None
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Success => write!(f, "success"),
            ExitState::Failed { code: Some(code) } => write!(f, "failed({})", code),
            ExitState::Failed { code: None } => write!(f, "failed"),
            ExitState::TimedOut => write!(f, "timed-out"),
        }
    }
}

/// The result of running an example's commands. Never mutated after creation.
/// 运行示例命令的结果。创建后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExitState,
    /// Duration of the simulation step, without build steps / 仿真步骤的耗时，不含构建步骤
    pub elapsed: Duration,
    /// Combined stdout and stderr of all steps / 所有步骤的合并 stdout 和 stderr
    pub output: String,
    /// Dataset files produced by the run / 运行产生的数据集文件
    pub artifacts: Vec<PathBuf>,
}

/// Result of the comparison phase of a job.
/// 任务比较阶段的结果。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ComparisonState {
    /// Comparison disabled.
    NotRun,
    /// The example has no `reference` directory.
    NoReference,
    Compared { outcome: ComparisonOutcome },
    /// The datasets could not be loaded.
    Error { message: String },
}

impl ComparisonState {
    pub fn failed(&self) -> usize {
        match self {
            ComparisonState::Compared { outcome } => outcome.failed,
            ComparisonState::Error { .. } => 1,
            _ => 0,
        }
    }
}

/// Everything the runner reports for one job.
/// 运行器为一个任务报告的所有内容。
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// `None` when running was disabled / 禁用运行时为 `None`
    pub execution: Option<ExecutionResult>,
    pub comparison: ComparisonState,
    /// Number of `Deprecated feature called:` lines in the output.
    pub deprecated_warnings: usize,
}

/// The final classification of a job.
/// 任务的最终分类。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum Verdict {
    Passed,
    /// The run failed or its output did not match the reference.
    /// 运行失败或其输出与参考不匹配。
    Failed,
    TimedOut,
    /// Orchestrating the job itself failed (error or panic).
    /// 任务编排本身失败（错误或 panic）。
    InternalError { message: String },
}

/// A job together with how it ended. One is produced for every scheduled job.
/// 一个任务及其结束方式。每个被调度的任务都会产生一个。
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: Job,
    pub verdict: Verdict,
    /// `None` for internal errors / 内部错误时为 `None`
    pub report: Option<JobReport>,
}

impl JobOutcome {
    pub fn from_report(job: Job, report: JobReport) -> Self {
        let verdict = match report.execution.as_ref().map(|e| e.status) {
            Some(ExitState::TimedOut) => Verdict::TimedOut,
            Some(ExitState::Failed { .. }) => Verdict::Failed,
            _ if report.comparison.failed() > 0 => Verdict::Failed,
            _ => Verdict::Passed,
        };
        Self {
            job,
            verdict,
            report: Some(report),
        }
    }

    pub fn internal_error(job: Job, message: String) -> Self {
        Self {
            job,
            verdict: Verdict::InternalError { message },
            report: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.verdict != Verdict::Passed
    }

    /// A failure that counts against the overall run.
    /// 计入整体运行结果的失败。
    pub fn is_unexpected_failure(&self) -> bool {
        self.is_failure() && !self.job.may_fail
    }

    pub fn is_allowed_failure(&self) -> bool {
        self.is_failure() && self.job.may_fail
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.report
            .as_ref()
            .and_then(|r| r.execution.as_ref())
            .map(|e| e.elapsed)
    }

    /// Gets the status of the outcome as a localized string for display.
    /// 以本地化字符串形式获取结果的状态以供显示。
    pub fn status_str(&self, locale: &str) -> String {
        let status = match &self.verdict {
            _ if self.is_allowed_failure() => t!("status.allowed_failure", locale = locale),
            Verdict::Passed => t!("status.passed", locale = locale),
            Verdict::Failed => t!("status.failed", locale = locale),
            Verdict::TimedOut => t!("status.timed_out", locale = locale),
            Verdict::InternalError { .. } => t!("status.internal_error", locale = locale),
        };
        status.to_string()
    }
}
