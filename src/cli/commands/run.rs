//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: it discovers and plans the
//! examples, executes them on the scheduler, reports every completion as it
//! arrives and fails if any example failed unexpectedly.
//!
//! 此模块实现 `run` 命令：发现并规划示例，在调度器上执行它们，
//! 在每个完成结果到达时进行报告，如果有示例意外失败则返回失败。

use anyhow::{Context, Result};
use colored::*;
use futures::StreamExt;
use std::{path::PathBuf, sync::Arc};

use super::{discover_jobs, load_settings, ConfigOverrides, ConfigSource};
use crate::{
    core::{
        config::{RunContext, RunnerConfig},
        execution::SimulationRunner,
        models::JobOutcome,
        planner,
        scheduler::Scheduler,
    },
    infra::{fs::absolute_path, t},
    reporting::{print_completion, print_summary, print_unexpected_failure_details, ResultSink},
};

/// Arguments of the `run` command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub source: ConfigSource,
    pub overrides: ConfigOverrides,
    pub examples_dir: PathBuf,
    pub dirs: Vec<String>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// An error if the setup failed or if an example that may not fail did fail.
pub async fn execute(args: RunArgs) -> Result<()> {
    let config = load_settings(&args.source, args.overrides)?;
    let locale = config.language.clone();

    let (examples_root, jobs) = discover_jobs(&args.examples_dir, &args.dirs)?;
    println!(
        "{}",
        t!("run.examples_root", locale = locale, path = examples_root.display())
    );

    let ctx = Arc::new(RunContext::from_config(&config, examples_root)?);
    check_tools(&ctx, &locale)?;

    let plan = planner::plan_execution(jobs, &config.filter, args.total_runners, args.runner_index)?;

    if plan.filtered_count > 0 {
        println!(
            "{}",
            t!(
                "run.filtered_examples",
                locale = locale,
                filtered = plan.filtered_count,
                total = plan.jobs.len()
            )
            .cyan()
        );
    }
    if plan.may_fail_count > 0 {
        println!(
            "{}",
            t!("run.may_fail_examples", locale = locale, count = plan.may_fail_count).yellow()
        );
    }
    if let (true, Some(total), Some(index)) = (plan.is_distributed, args.total_runners, args.runner_index) {
        println!(
            "{}",
            t!(
                "run.running_as_split_runner",
                locale = locale,
                index = index + 1,
                total = total,
                count = plan.jobs.len()
            )
            .bold()
        );
    }

    if plan.jobs.is_empty() {
        println!("{}", t!("run.no_examples_to_run", locale = locale).green());
        return Ok(());
    }

    let report_dir = absolute_report_dir(&config)?;
    let mut sink = ResultSink::create(&report_dir)?;
    let parallelism = effective_jobs(&config);
    println!(
        "{}",
        t!(
            "run.starting",
            locale = locale,
            count = plan.jobs.len(),
            jobs = parallelism
        )
        .bold()
    );

    let runner = SimulationRunner::new(Arc::clone(&ctx), report_dir.clone());
    let mut completions = Scheduler::new(runner, parallelism).start(plan.jobs);

    let mut outcomes: Vec<JobOutcome> = Vec::new();
    while let Some(completion) = completions.next().await {
        print_completion(&completion, &locale);
        if let Err(e) = sink.record(&completion.outcome) {
            tracing::warn!(job = %completion.outcome.job.id, error = %format!("{:#}", e), "failed to record result");
        }
        outcomes.push(completion.outcome);
    }
    outcomes.sort_by(|a, b| a.job.id.cmp(&b.job.id));

    print_summary(&outcomes, &locale);
    println!(
        "\n{}",
        t!("run.results_written", locale = locale, path = sink.results_path().display())
    );

    let unexpected_failures: Vec<&JobOutcome> =
        outcomes.iter().filter(|o| o.is_unexpected_failure()).collect();
    if unexpected_failures.is_empty() {
        println!("\n{}", t!("run.all_passed", locale = locale).green().bold());
        Ok(())
    } else {
        print_unexpected_failure_details(&unexpected_failures, &locale);
        anyhow::bail!(t!(
            "run.examples_failed",
            locale = locale,
            count = unexpected_failures.len()
        )
        .to_string());
    }
}

/// Number of parallel jobs: the configured value or the CPU count.
pub fn effective_jobs(config: &RunnerConfig) -> usize {
    if config.jobs == 0 {
        num_cpus::get()
    } else {
        config.jobs
    }
}

fn absolute_report_dir(config: &RunnerConfig) -> Result<PathBuf> {
    if config.report_dir.is_absolute() {
        return Ok(config.report_dir.clone());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(&config.report_dir))
}

/// A configured tool directory that does not exist is a setup error.
/// 配置的工具目录不存在属于设置错误。
fn check_tools(ctx: &RunContext, locale: &str) -> Result<()> {
    if ctx.disable_run {
        return Ok(());
    }
    if let Some(bin_dir) = &ctx.bin_dir {
        absolute_path(bin_dir)
            .with_context(|| t!("run.bin_dir_not_found", locale = locale, path = bin_dir.display()).to_string())?;
    }
    Ok(())
}
