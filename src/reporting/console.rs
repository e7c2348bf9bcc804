//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints job progress, run summaries and failure details to the
//! console, with color coding and internationalization support.
//!
//! 此模块在控制台打印任务进度、运行摘要和失败详情，支持颜色编码和国际化。

use colored::*;
use std::time::Duration;

use crate::core::comparison::{ColumnVerdict, ComparisonOutcome, DatasetVerdict, FileVerdict};
use crate::core::models::{ComparisonState, JobOutcome, Verdict};
use crate::core::scheduler::JobCompletion;
use crate::infra::t;

/// Number of trailing output lines shown for a failed job.
const OUTPUT_TAIL_LINES: usize = 40;

/// Formats an ETA as `h:mm:ss`, or `unknown`.
/// 将 ETA 格式化为 `h:mm:ss` 或 `unknown`。
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => {
            let secs = eta.as_secs();
            format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
        }
        None => "unknown".to_string(),
    }
}

fn colored_status(outcome: &JobOutcome, locale: &str) -> ColoredString {
    let status = outcome.status_str(locale);
    if outcome.is_allowed_failure() {
        status.yellow()
    } else {
        match outcome.verdict {
            Verdict::Passed => status.green(),
            Verdict::InternalError { .. } => status.magenta(),
            _ => status.red(),
        }
    }
}

/// Prints the line reported after each finished job.
///
/// ```text
/// Finished example 003/010; 30.0%; ETA 0:01:23; mechanics/pendulum; passed
/// ```
pub fn print_completion(completion: &JobCompletion, locale: &str) {
    let progress = &completion.progress;
    let width = progress.total.to_string().len().max(3);
    println!(
        "{}",
        t!(
            "report.finished_example",
            locale = locale,
            finished = format!("{:0width$}", progress.finished, width = width),
            total = format!("{:0width$}", progress.total, width = width),
            percent = format!("{:.1}", progress.percent()),
            eta = format_eta(progress.eta),
            id = completion.outcome.job.id,
            status = colored_status(&completion.outcome, locale)
        )
    );
}

/// Prints a formatted summary of all job outcomes to the console.
/// Displays a table with status, example id, duration and comparison counts.
///
/// 在控制台打印所有任务结果的格式化摘要。
/// 显示一个包含状态、示例 id、持续时间和比较计数的表格。
///
/// # Output Format / 输出格式
/// ```text
/// --- Example Summary ---
///   - Passed             | mechanics/pendulum                       |      1.23s  (152/152)
///   - Failed             | xml/hydraulics                           |      0.45s  (3 failed)
///   - Timed out          | fmi/slider_crank                         |   1800.00s
/// ```
pub fn print_summary(outcomes: &[JobOutcome], locale: &str) {
    println!("\n{}", t!("report.summary_banner", locale = locale).bold());

    for outcome in outcomes {
        let duration_str = outcome
            .elapsed()
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "N/A".to_string());

        let comparison_str = match outcome.report.as_ref().map(|r| &r.comparison) {
            Some(ComparisonState::Compared { outcome: cmp }) if cmp.failed > 0 => {
                format!(" ({})", t!("report.compare_failed_count", locale = locale, count = cmp.failed))
            }
            Some(ComparisonState::Compared { outcome: cmp }) => {
                format!(" ({}/{})", cmp.compared - cmp.failed, cmp.compared)
            }
            Some(ComparisonState::NoReference) => {
                format!(" ({})", t!("report.no_reference", locale = locale))
            }
            _ => String::new(),
        };

        println!(
            "  - {:<18} | {:<40} | {:>10} {}",
            colored_status(outcome, locale),
            outcome.job.id,
            duration_str,
            comparison_str
        );
    }

    let failed = outcomes.iter().filter(|o| o.is_unexpected_failure()).count();
    let allowed = outcomes.iter().filter(|o| o.is_allowed_failure()).count();
    let deprecated: usize = outcomes
        .iter()
        .filter_map(|o| o.report.as_ref())
        .map(|r| r.deprecated_warnings)
        .sum();
    println!(
        "\n{}",
        t!(
            "report.summary_counts",
            locale = locale,
            total = outcomes.len(),
            failed = failed,
            allowed = allowed
        )
    );
    if deprecated > 0 {
        println!(
            "{}",
            t!("report.deprecated_warnings", locale = locale, count = deprecated).yellow()
        );
    }
}

/// Prints detailed information about unexpected failures: the reason, the
/// failing comparison items and the tail of the captured output.
///
/// 打印意外失败的详细信息：原因、失败的比较项以及捕获输出的末尾部分。
pub fn print_unexpected_failure_details(unexpected_failures: &[&JobOutcome], locale: &str) {
    if unexpected_failures.is_empty() {
        return;
    }

    println!("\n{}", t!("report.unexpected_failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, outcome) in unexpected_failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            unexpected_failures.len(),
            t!("report.header_failure", locale = locale).red(),
            outcome.job.id.cyan(),
            outcome.job.kind
        );

        if let Verdict::InternalError { message } = &outcome.verdict {
            println!("\n--- {} ---\n", t!("report.internal_error_log", locale = locale).yellow());
            println!("{}", message);
        }

        if let Some(report) = &outcome.report {
            match &report.comparison {
                ComparisonState::Compared { outcome: cmp } if cmp.failed > 0 => {
                    println!("\n--- {} ---\n", t!("report.comparison_log", locale = locale).yellow());
                    print_comparison_failures(cmp);
                }
                ComparisonState::Error { message } => {
                    println!("\n--- {} ---\n", t!("report.comparison_log", locale = locale).yellow());
                    println!("{}", message);
                }
                _ => {}
            }
            if let Some(execution) = report.execution.as_ref().filter(|e| !e.status.is_success()) {
                println!(
                    "\n--- {} ({}) ---\n",
                    t!("report.execution_log", locale = locale).yellow(),
                    execution.status
                );
                println!("{}", output_tail(&execution.output, OUTPUT_TAIL_LINES));
            }
        }
        println!("\n{}", "-".repeat(80));
    }
}

/// Prints every failed item of a comparison, one per line.
/// 打印比较中的每个失败项，每行一个。
pub fn print_comparison_failures(outcome: &ComparisonOutcome) {
    for file in &outcome.files {
        let what = match file.verdict {
            FileVerdict::MissingInCurrent => "file missing in current",
            FileVerdict::MissingInReference => "file missing in reference",
        };
        println!("  {} {}", file.file.cyan(), what.red());
    }
    for dataset in &outcome.datasets {
        let columns = match &dataset.verdict {
            DatasetVerdict::Compared { columns } => columns,
            DatasetVerdict::MissingInCurrent => {
                println!("  {}:{} {}", dataset.file.cyan(), dataset.dataset, "dataset missing in current".red());
                continue;
            }
            DatasetVerdict::MissingInReference => {
                println!("  {}:{} {}", dataset.file.cyan(), dataset.dataset, "dataset missing in reference".red());
                continue;
            }
        };
        for column in columns.iter().filter(|c| c.failed()) {
            let label = column
                .reference_label
                .as_deref()
                .or(column.current_label.as_deref())
                .unwrap_or("-");
            let mut what = match &column.verdict {
                ColumnVerdict::ToleranceViolation {
                    first_index,
                    violations,
                    max_abs_diff,
                } => format!(
                    "{} samples out of tolerance, first at row {}, max |diff| {:e}",
                    violations, first_index, max_abs_diff
                ),
                ColumnVerdict::RowCountMismatch {
                    reference_rows,
                    current_rows,
                } => format!("row count {} != {}", current_rows, reference_rows),
                ColumnVerdict::MissingColumn => "column missing in current".to_string(),
                ColumnVerdict::ExtraColumn => "label not in reference".to_string(),
                ColumnVerdict::Passed | ColumnVerdict::NoData => String::new(),
            };
            if column.label_mismatch {
                if !what.is_empty() {
                    what.push_str("; ");
                }
                what.push_str(&format!(
                    "label mismatch {:?} != {:?}",
                    column.current_label, column.reference_label
                ));
            }
            println!(
                "  {}:{} [{}] {} {}",
                dataset.file.cyan(),
                dataset.dataset,
                column.index,
                label,
                what.red()
            );
        }
    }
}

/// Prints the totals of a standalone comparison.
pub fn print_comparison_outcome(outcome: &ComparisonOutcome, locale: &str) {
    print_comparison_failures(outcome);
    let line = t!(
        "report.comparison_totals",
        locale = locale,
        compared = outcome.compared,
        failed = outcome.failed
    );
    if outcome.passed() {
        println!("{}", line.green());
    } else {
        println!("{}", line.red().bold());
    }
}

fn output_tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
