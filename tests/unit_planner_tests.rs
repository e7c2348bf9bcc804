//! # Planner Unit Tests / 计划模块单元测试

mod common;

use common::job;
use example_runner::config::FilterConfig;
use example_runner::core::planner::{order_jobs, plan_execution};

fn ids(jobs: &[example_runner::models::Job]) -> Vec<&str> {
    jobs.iter().map(|j| j.id.as_str()).collect()
}

#[test]
fn test_unknown_durations_first_then_longest() {
    let mut jobs = vec![
        job("short", Some(1.0)),
        job("unknown_b", None),
        job("long", Some(60.0)),
        job("unknown_a", None),
        job("medium", Some(10.0)),
        job("also_medium", Some(10.0)),
    ];
    order_jobs(&mut jobs);
    assert_eq!(
        ids(&jobs),
        vec!["unknown_a", "unknown_b", "long", "also_medium", "medium", "short"]
    );
}

#[test]
fn test_plan_applies_filter_and_counts_may_fail() {
    let mut flaky = job("flaky", Some(2.0));
    flaky.may_fail = true;
    let mut daily = job("daily", Some(3.0));
    daily.labels = vec!["daily".to_string()];

    let plan = plan_execution(vec![job("a", Some(1.0)), flaky, daily], &FilterConfig::default(), None, None).unwrap();
    assert_eq!(ids(&plan.jobs), vec!["flaky", "a"]);
    assert_eq!(plan.filtered_count, 1);
    assert_eq!(plan.may_fail_count, 1);
    assert!(!plan.is_distributed);
}

#[test]
fn test_sharding_splits_ordered_jobs() {
    let jobs: Vec<_> = (0..5).map(|i| job(&format!("j{}", i), Some(10.0 - i as f64))).collect();

    let first = plan_execution(jobs.clone(), &FilterConfig::default(), Some(2), Some(0)).unwrap();
    let second = plan_execution(jobs, &FilterConfig::default(), Some(2), Some(1)).unwrap();
    assert!(first.is_distributed);
    assert_eq!(ids(&first.jobs), vec!["j0", "j2", "j4"]);
    assert_eq!(ids(&second.jobs), vec!["j1", "j3"]);
}

#[test]
fn test_invalid_sharding_arguments() {
    let jobs = vec![job("a", None)];
    let err = plan_execution(jobs.clone(), &FilterConfig::default(), Some(2), Some(2)).unwrap_err();
    assert!(err.to_string().contains("Runner index must be less than total runners"));

    let err = plan_execution(jobs, &FilterConfig::default(), Some(2), None).unwrap_err();
    assert!(err.to_string().contains("Both --total-runners and --runner-index"));
}
