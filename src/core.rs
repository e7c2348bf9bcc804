//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Example Runner,
//! including data models, configuration, example discovery, the job
//! scheduler and the dataset comparison engine.
//!
//! 此模块包含 Example Runner 的核心功能，
//! 包括数据模型、配置、示例发现、任务调度器和数据集比较引擎。

pub mod comparison;
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod execution;
pub mod models;
pub mod planner;
pub mod scheduler;

// Re-exports
pub use comparison::Comparator;
pub use config::{RunContext, RunnerConfig};
pub use execution::SimulationRunner;
pub use models::{Job, JobOutcome};
pub use scheduler::Scheduler;
