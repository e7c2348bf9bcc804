//! # Copy-to-Reference Command Module / 复制到参考命令模块
//!
//! Promotes the current outputs of the selected examples to reference data.
//!
//! 将选定示例的当前输出提升为参考数据。

use anyhow::Result;
use colored::*;
use std::path::Path;

use super::{discover_jobs, load_settings, ConfigOverrides, ConfigSource};
use crate::core::planner;
use crate::infra::{fs, t};

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

    let mut copied = 0;
    for job in &plan.jobs {
        let count = fs::copy_to_reference(&job.path, &config.dataset_suffix)?;
        if count == 0 {
            println!(
                "{}",
                t!("reference.nothing_to_copy", locale = locale, id = job.id).yellow()
            );
        }
        copied += count;
    }
    println!(
        "{}",
        t!(
            "reference.copied",
            locale = locale,
            files = copied,
            examples = plan.jobs.len()
        )
        .green()
    );
    Ok(())
}
