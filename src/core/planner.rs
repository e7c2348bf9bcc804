//! # Execution Planner Module / 执行计划模块
//!
//! This module turns the discovered examples into an ordered execution plan:
//! filtering by labels and kinds, ordering long-running examples first and
//! distributing the examples across CI runners.
//!
//! 此模块将发现的示例转换为有序的执行计划：
//! 按标签和类型过滤、优先安排耗时长的示例，以及在 CI 运行器之间分配示例。

use anyhow::{bail, Result};
use std::cmp::Ordering;

use crate::core::config::FilterConfig;
use crate::core::discovery;
use crate::core::models::Job;

/// Represents a complete execution plan for a run.
/// 表示一次运行的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The jobs to execute, longest reference duration first.
    /// 要执行的任务，参考时长最长的排在最前。
    pub jobs: Vec<Job>,
    /// The number of examples rejected by the filter.
    /// 被过滤器拒绝的示例数量。
    pub filtered_count: usize,
    /// The number of jobs that are allowed to fail.
    /// 允许失败的任务数量。
    pub may_fail_count: usize,
    /// Whether the jobs are distributed across multiple runners (CI environment).
    /// 任务是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Orders jobs by reference duration, descending. Unknown durations count as
/// infinite and run first; ties are broken by id for a deterministic order.
///
/// 按参考时长降序排列任务。未知时长视为无穷大并最先运行；相同时按 id 排序以保证顺序确定。
pub fn order_jobs(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| match (a.reference_duration, b.reference_duration) {
        (None, None) => a.id.cmp(&b.id),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(da), Some(db)) => db.cmp(&da).then_with(|| a.id.cmp(&b.id)),
    });
}

/// Creates an execution plan for the discovered jobs.
///
/// # Arguments
/// * `jobs` - All discovered jobs
/// * `filter` - Label and kind filter
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
pub fn plan_execution(
    jobs: Vec<Job>,
    filter: &FilterConfig,
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan> {
    let (mut jobs, filtered_count) = discovery::apply_filter(jobs, filter);
    order_jobs(&mut jobs);

    // Distribute jobs if running in CI
    let (jobs, is_distributed) = if let (Some(total), Some(index)) = (total_runners, runner_index) {
        if total == 0 || index >= total {
            bail!("Runner index must be less than total runners.");
        }
        let distributed: Vec<_> = jobs
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % total == index)
            .map(|(_, job)| job)
            .collect();
        (distributed, true)
    } else {
        if total_runners.is_some() || runner_index.is_some() {
            bail!("Both --total-runners and --runner-index must be provided.");
        }
        (jobs, false)
    };

    let may_fail_count = jobs.iter().filter(|job| job.may_fail).count();
    Ok(ExecutionPlan {
        jobs,
        filtered_count,
        may_fail_count,
        is_distributed,
    })
}
