//! # Configuration Module / 配置模块
//!
//! `RunExamples.toml` holds the settings of a run. Every field has a default,
//! so an empty file (or no file at all) is a valid configuration. Command-line
//! flags override file values; the merged result becomes an immutable
//! [`RunContext`] shared by all jobs.
//!
//! `RunExamples.toml` 保存一次运行的设置。每个字段都有默认值，
//! 因此空文件（或根本没有文件）也是有效配置。命令行参数会覆盖文件中的值；
//! 合并结果成为所有任务共享的不可变 [`RunContext`]。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::comparison::Comparator;
use crate::core::models::ExampleKind;

/// The default name of the configuration file.
/// 配置文件的默认名称。
pub const CONFIG_FILE_NAME: &str = "RunExamples.toml";

/// Absolute and relative tolerance of a comparison. Both are non-negative.
/// 比较的绝对容差和相对容差。两者均为非负数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    pub atol: f64,
    pub rtol: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            atol: 2e-5,
            rtol: 2e-5,
        }
    }
}

impl ToleranceConfig {
    pub fn new(atol: f64, rtol: f64) -> Result<Self> {
        let tolerance = Self { atol, rtol };
        tolerance.validate()?;
        Ok(tolerance)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.atol >= 0.0) || !(self.rtol >= 0.0) {
            anyhow::bail!(
                "Tolerances must be non-negative numbers (atol = {}, rtol = {})",
                self.atol,
                self.rtol
            );
        }
        Ok(())
    }
}

/// Which discovered examples take part in a run.
/// 哪些已发现的示例参与运行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// An example runs if it carries at least one of these labels; empty accepts all.
    /// 如果示例至少带有其中一个标签，则运行；为空则全部接受。
    pub labels: Vec<String>,
    /// An example carrying any of these labels is skipped.
    /// 带有其中任何一个标签的示例将被跳过。
    pub exclude_labels: Vec<String>,
    /// Allowed example kinds; empty accepts all.
    /// 允许的示例类型；为空则全部接受。
    pub kinds: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            labels: vec!["nightly".to_string()],
            exclude_labels: Vec::new(),
            kinds: Vec::new(),
        }
    }
}

impl FilterConfig {
    pub fn accepts(&self, kind: ExampleKind, labels: &[String]) -> bool {
        let has_label = |wanted: &String| labels.iter().any(|l| l == wanted);
        (self.labels.is_empty() || self.labels.iter().any(has_label))
            && !self.exclude_labels.iter().any(has_label)
            && (self.kinds.is_empty() || self.kinds.iter().any(|k| k == kind.as_str()))
    }
}

/// The on-disk configuration, loaded from a TOML file.
/// 从 TOML 文件加载的磁盘配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    pub language: String,
    /// Directory of the simulation tools; `~` and `$VARS` are expanded.
    /// Empty means the tools are looked up on `PATH`.
    /// 仿真工具所在目录；会展开 `~` 和 `$VARS`。为空表示在 `PATH` 中查找工具。
    pub bin_dir: String,
    /// Number of parallel jobs; 0 means the number of CPUs.
    /// 并行任务数；0 表示 CPU 数量。
    pub jobs: usize,
    /// Wall-clock limit per command in minutes; 0 disables it.
    /// 每个命令的时间限制（分钟）；0 表示禁用。
    pub max_execution_time: f64,
    pub atol: f64,
    pub rtol: f64,
    /// Failures beyond this count get no diff artifact; 0 means unlimited.
    /// 超过此数量的失败不生成差异产物；0 表示不限制。
    pub max_compare_failure: usize,
    pub report_dir: PathBuf,
    /// Command prefix for every simulation, e.g. `valgrind --error-exitcode=1`.
    /// 每次仿真的命令前缀，例如 `valgrind --error-exitcode=1`。
    pub prefix_simulation: String,
    /// Executable extension of the tools, e.g. `.exe`; a non-empty value runs them through `wine`.
    /// 工具的可执行文件扩展名，例如 `.exe`；非空值会通过 `wine` 运行它们。
    pub exe_ext: String,
    pub disable_run: bool,
    pub disable_make_clean: bool,
    pub disable_compare: bool,
    pub print_to_console: bool,
    pub inspect_core_dumps: bool,
    /// File name suffix of dataset files / 数据集文件的文件名后缀
    pub dataset_suffix: String,
    pub filter: FilterConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            bin_dir: String::new(),
            jobs: 0,
            max_execution_time: 30.0,
            atol: ToleranceConfig::default().atol,
            rtol: ToleranceConfig::default().rtol,
            max_compare_failure: 200,
            report_dir: PathBuf::from("runexamples_report"),
            prefix_simulation: String::new(),
            exe_ext: String::new(),
            disable_run: false,
            disable_make_clean: false,
            disable_compare: false,
            print_to_console: false,
            inspect_core_dumps: true,
            dataset_suffix: ".dataset.json".to_string(),
            filter: FilterConfig::default(),
        }
    }
}

/// Loads the configuration from `path`.
/// 从 `path` 加载配置。
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<RunnerConfig> {
    let config: RunnerConfig = toml::from_str(content)?;
    ToleranceConfig::new(config.atol, config.rtol)?;
    if !(config.max_execution_time >= 0.0) {
        anyhow::bail!("max_execution_time must be a non-negative number of minutes");
    }
    Ok(config)
}

/// The resolved, read-only settings shared by all jobs of a run.
/// 一次运行中所有任务共享的已解析只读设置。
#[derive(Debug, Clone)]
pub struct RunContext {
    pub examples_root: PathBuf,
    /// Expanded tool directory; `None` means `PATH` lookup.
    pub bin_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub comparator: Comparator,
    pub prefix_simulation: Vec<String>,
    pub exe_ext: String,
    pub disable_run: bool,
    pub disable_make_clean: bool,
    pub disable_compare: bool,
    pub print_to_console: bool,
    pub inspect_core_dumps: bool,
    pub dataset_suffix: String,
    /// Pass `-s 0.01` to the FMU checker (`MBSIM_SET_MINIMAL_TEND`).
    pub minimal_end_time: bool,
}

impl RunContext {
    /// Builds the run context from a configuration.
    /// 根据配置构建运行上下文。
    pub fn from_config(config: &RunnerConfig, examples_root: PathBuf) -> Result<Self> {
        let tolerance = ToleranceConfig::new(config.atol, config.rtol)?;

        let bin_dir = if config.bin_dir.trim().is_empty() {
            None
        } else {
            let expanded = shellexpand::full(&config.bin_dir)
                .with_context(|| format!("Failed to expand bin_dir: {}", config.bin_dir))?;
            Some(PathBuf::from(expanded.as_ref()))
        };

        let prefix_simulation = shlex::split(&config.prefix_simulation).ok_or_else(|| {
            anyhow::anyhow!("Failed to parse prefix_simulation: {}", config.prefix_simulation)
        })?;

        let timeout = (config.max_execution_time > 0.0)
            .then(|| Duration::from_secs_f64(config.max_execution_time * 60.0));

        Ok(Self {
            examples_root,
            bin_dir,
            timeout,
            comparator: Comparator::new(tolerance, config.max_compare_failure),
            prefix_simulation,
            exe_ext: config.exe_ext.clone(),
            disable_run: config.disable_run,
            disable_make_clean: config.disable_make_clean,
            disable_compare: config.disable_compare,
            print_to_console: config.print_to_console,
            inspect_core_dumps: config.inspect_core_dumps,
            dataset_suffix: config.dataset_suffix.clone(),
            minimal_end_time: std::env::var_os("MBSIM_SET_MINIMAL_TEND").is_some(),
        })
    }

    /// Resolves a tool name against `bin_dir`, appending the executable extension.
    /// 根据 `bin_dir` 解析工具名称，并附加可执行文件扩展名。
    pub fn tool(&self, name: &str) -> PathBuf {
        let file = format!("{}{}", name, self.exe_ext);
        match &self.bin_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }
}
