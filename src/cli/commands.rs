//! # Commands Module / 命令模块
//!
//! Implementations of the subcommands and the configuration loading they share.
//!
//! 子命令的实现以及它们共享的配置加载逻辑。

pub mod compare;
pub mod init;
pub mod list;
pub mod reference;
pub mod run;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::config::{self, RunnerConfig};
use crate::core::discovery;
use crate::core::models::Job;
use crate::infra::fs::absolute_path;
use crate::infra::t;

/// Where the configuration comes from.
/// 配置的来源。
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Given explicitly on the command line: a missing file is an error.
    /// 在命令行中显式给出：文件缺失即为错误。
    pub required: bool,
}

/// Command-line values that take precedence over the configuration file.
/// 优先于配置文件的命令行值。
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub language: Option<String>,
    pub jobs: Option<usize>,
    pub bin_dir: Option<String>,
    pub max_execution_time: Option<f64>,
    pub atol: Option<f64>,
    pub rtol: Option<f64>,
    pub max_compare_failure: Option<usize>,
    pub report_dir: Option<PathBuf>,
    pub disable_run: bool,
    pub disable_make_clean: bool,
    pub disable_compare: bool,
    pub print_to_console: bool,
    pub labels: Option<Vec<String>>,
    pub exclude_labels: Option<Vec<String>>,
    pub kinds: Option<Vec<String>>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut RunnerConfig) {
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(bin_dir) = self.bin_dir {
            config.bin_dir = bin_dir;
        }
        if let Some(minutes) = self.max_execution_time {
            config.max_execution_time = minutes;
        }
        if let Some(atol) = self.atol {
            config.atol = atol;
        }
        if let Some(rtol) = self.rtol {
            config.rtol = rtol;
        }
        if let Some(max) = self.max_compare_failure {
            config.max_compare_failure = max;
        }
        if let Some(report_dir) = self.report_dir {
            config.report_dir = report_dir;
        }
        config.disable_run |= self.disable_run;
        config.disable_make_clean |= self.disable_make_clean;
        config.disable_compare |= self.disable_compare;
        config.print_to_console |= self.print_to_console;
        if let Some(labels) = self.labels {
            config.filter.labels = labels;
        }
        if let Some(exclude_labels) = self.exclude_labels {
            config.filter.exclude_labels = exclude_labels;
        }
        if let Some(kinds) = self.kinds {
            config.filter.kinds = kinds;
        }
    }
}

/// Loads the configuration file (or the defaults when an implicit file is
/// absent), applies the overrides and switches to the configured language.
///
/// 加载配置文件（隐式文件不存在时使用默认值），应用覆盖项并切换到配置的语言。
pub fn load_settings(source: &ConfigSource, overrides: ConfigOverrides) -> Result<RunnerConfig> {
    let mut config = if source.required || source.path.exists() {
        config::load_config(&source.path)?
    } else {
        tracing::debug!(path = %source.path.display(), "no config file, using defaults");
        RunnerConfig::default()
    };
    overrides.apply(&mut config);
    config::ToleranceConfig::new(config.atol, config.rtol)?;
    if !(config.max_execution_time >= 0.0) {
        anyhow::bail!("max_execution_time must be a non-negative number of minutes");
    }
    crate::set_language(&config.language);
    Ok(config)
}

/// Resolves the examples root and discovers the selected examples.
/// 解析示例根目录并发现选定的示例。
pub fn discover_jobs(examples_dir: &Path, dirs: &[String]) -> Result<(PathBuf, Vec<Job>)> {
    let root = absolute_path(examples_dir)?;
    if !root.is_dir() {
        anyhow::bail!(t!("run.examples_dir_not_found", path = root.display()).to_string());
    }
    let jobs = discovery::discover(&root, dirs)?;
    Ok((root, jobs))
}
