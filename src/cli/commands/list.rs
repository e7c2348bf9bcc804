//! # List Command Module / 列表命令模块
//!
//! Prints the examples a `run` with the same arguments would execute,
//! in execution order.
//!
//! 按执行顺序打印使用相同参数的 `run` 将执行的示例。

use anyhow::Result;
use colored::*;
use std::path::Path;

use super::{discover_jobs, load_settings, ConfigOverrides, ConfigSource};
use crate::core::planner;
use crate::infra::t;

pub fn execute(
    source: &ConfigSource,
    overrides: ConfigOverrides,
    examples_dir: &Path,
    dirs: &[String],
) -> Result<()> {
    let config = load_settings(source, overrides)?;
    let locale = config.language.as_str();
    let (_, jobs) = discover_jobs(examples_dir, dirs)?;
    let plan = planner::plan_execution(jobs, &config.filter, None, None)?;

    for job in &plan.jobs {
        let duration = job
            .reference_duration
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "?".to_string());
        let may_fail = if job.may_fail { " (willfail)".yellow() } else { "".normal() };
        println!(
            "  - {:<10} | {:<40} | {:>10}{}",
            job.kind.as_str().cyan(),
            job.id,
            duration,
            may_fail
        );
    }
    println!(
        "\n{}",
        t!(
            "list.count",
            locale = locale,
            count = plan.jobs.len(),
            filtered = plan.filtered_count
        )
    );
    Ok(())
}
