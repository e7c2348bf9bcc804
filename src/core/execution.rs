//! # Example Execution Engine Module / 示例执行引擎模块
//!
//! This module runs a single example through the execution path of its kind:
//! cleaning previous outputs, building, running the simulation, exporting and
//! checking FMUs, and finally comparing the produced datasets with the
//! reference.
//!
//! 此模块按示例类型对应的执行路径运行单个示例：
//! 清理先前的输出、构建、运行仿真、导出并检查 FMU，最后将产生的数据集与参考进行比较。

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::core::config::RunContext;
use crate::core::dataset::{Dataset, DatasetCollection, DatasetStore};
use crate::core::models::{
    ComparisonState, ExampleKind, ExecutionResult, ExitState, Job, JobReport,
};
use crate::core::scheduler::JobRunner;
use crate::infra::command::{self, CommandOutcome, CommandPolicy, OutputSink};
use crate::infra::fs::{self as runner_fs, REFERENCE_DIR, TIME_FILE};
use crate::infra::t;

/// Name of the captured output file in a job's report directory.
pub const EXECUTE_FILE: &str = "execute.txt";

/// Marker of deprecation warnings printed by the simulation tools.
pub const DEPRECATION_MARKER: &str = "Deprecated feature called:";

const FMU_CHECK_TMP_DIR: &str = "tmp_fmuCheck";
const FMU_CHECK_CSV: &str = "fmuCheck.result.csv";
const FMU_CHECK_DATASET: &str = "fmuCheckResult";
const FMU_TEST_TMP_DIR: &str = "tmp_mbsimTestFMU";
const FMU_FILE: &str = "mbsim.fmu";

/// Runs examples with the settings of a [`RunContext`].
/// 使用 [`RunContext`] 的设置运行示例。
pub struct SimulationRunner {
    ctx: Arc<RunContext>,
    report_dir: PathBuf,
}

impl SimulationRunner {
    pub fn new(ctx: Arc<RunContext>, report_dir: PathBuf) -> Self {
        Self { ctx, report_dir }
    }

    /// Directory holding the captured output and diff artifacts of a job.
    /// 保存任务捕获输出和差异产物的目录。
    pub fn job_report_dir(&self, job: &Job) -> PathBuf {
        self.report_dir.join(&job.id)
    }

    async fn execute(&self, job: &Job, job_report_dir: &Path) -> Result<ExecutionResult> {
        let execute_file = job_report_dir.join(EXECUTE_FILE);
        let sink = OutputSink::to_file(&execute_file, self.ctx.print_to_console)
            .with_context(|| format!("Failed to create {}", execute_file.display()))?;

        let steps = match runner_fs::clean_outputs(&job.path, &self.ctx.dataset_suffix) {
            Ok(()) => {
                let pipeline = Pipeline {
                    ctx: &self.ctx,
                    job,
                    sink: &sink,
                };
                pipeline.run().await?
            }
            Err(e) => {
                sink.write(&format!("{}\n{:#}\n", t!("run.clean_failed"), e)).await;
                Steps::failed_before_simulation(ExitState::Failed { code: None })
            }
        };

        runner_fs::write_atomic(
            &job.path.join(TIME_FILE),
            format!("{:.3}\n", steps.simulation.as_secs_f64()).as_bytes(),
        )?;

        Ok(ExecutionResult {
            status: steps.state,
            elapsed: steps.simulation,
            output: sink.contents().await,
            artifacts: runner_fs::files_with_suffix(&job.path, &self.ctx.dataset_suffix)?,
        })
    }

    fn compare(&self, job: &Job) -> ComparisonState {
        if self.ctx.disable_compare {
            return ComparisonState::NotRun;
        }
        let reference_dir = job.path.join(REFERENCE_DIR);
        if !reference_dir.is_dir() {
            return ComparisonState::NoReference;
        }
        let suffix = &self.ctx.dataset_suffix;
        let stores = DatasetStore::load_dir(&reference_dir, suffix)
            .and_then(|reference| Ok((reference, DatasetStore::load_dir(&job.path, suffix)?)));
        match stores {
            Ok((reference, current)) => ComparisonState::Compared {
                outcome: self.ctx.comparator.compare_stores(&reference, &current),
            },
            Err(e) => ComparisonState::Error {
                message: e.to_string(),
            },
        }
    }
}

impl JobRunner for SimulationRunner {
    async fn run(&self, job: &Job) -> Result<JobReport> {
        let job_report_dir = self.job_report_dir(job);
        fs::create_dir_all(&job_report_dir)
            .with_context(|| format!("Failed to create {}", job_report_dir.display()))?;

        let execution = if self.ctx.disable_run {
            None
        } else {
            Some(self.execute(job, &job_report_dir).await?)
        };
        let deprecated_warnings = execution
            .as_ref()
            .map(|e| count_deprecation_warnings(&e.output))
            .unwrap_or(0);

        Ok(JobReport {
            execution,
            comparison: self.compare(job),
            deprecated_warnings,
        })
    }
}

/// Counts the lines reporting a deprecated feature.
pub fn count_deprecation_warnings(output: &str) -> usize {
    output
        .lines()
        .filter(|line| line.contains(DEPRECATION_MARKER))
        .count()
}

/// Merges the states of consecutive steps: a timeout dominates, then the first failure.
/// 合并连续步骤的状态：超时优先，其次是第一个失败。
pub fn merge_states(first: ExitState, second: ExitState) -> ExitState {
    match (first, second) {
        (ExitState::TimedOut, _) | (_, ExitState::TimedOut) => ExitState::TimedOut,
        (ExitState::Failed { .. }, _) => first,
        _ => second,
    }
}

/// Finds the single `fmuCheck.*` executable in `bin_dir`.
/// 在 `bin_dir` 中查找唯一的 `fmuCheck.*` 可执行文件。
pub fn find_fmu_checker(bin_dir: Option<&Path>) -> Result<PathBuf> {
    let bin_dir = bin_dir.context("bin_dir must be configured to locate fmuCheck")?;
    let mut candidates: Vec<PathBuf> = fs::read_dir(bin_dir)
        .with_context(|| format!("Failed to read bin_dir: {}", bin_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("fmuCheck."))
        })
        .collect();
    if candidates.len() != 1 {
        anyhow::bail!(
            "Expected exactly one fmuCheck.* executable in {}, found {}",
            bin_dir.display(),
            candidates.len()
        );
    }
    Ok(candidates.remove(0))
}

/// Merged state of an example's steps and the duration of its simulation step.
/// Only the simulation step is timed, so build steps never end up in `time.dat`.
///
/// 示例各步骤的合并状态及其仿真步骤的耗时。
/// 只对仿真步骤计时，因此构建步骤不会计入 `time.dat`。
struct Steps {
    state: ExitState,
    simulation: Duration,
}

impl Steps {
    fn failed_before_simulation(state: ExitState) -> Self {
        Self {
            state,
            simulation: Duration::ZERO,
        }
    }
}

impl From<CommandOutcome> for Steps {
    fn from(outcome: CommandOutcome) -> Self {
        Self {
            state: outcome.state,
            simulation: outcome.elapsed,
        }
    }
}

/// The steps of one example. A failing build step ends the example.
struct Pipeline<'a> {
    ctx: &'a RunContext,
    job: &'a Job,
    sink: &'a OutputSink,
}

impl Pipeline<'_> {
    async fn run(&self) -> Result<Steps> {
        match self.job.kind {
            ExampleKind::Compiled => self.compiled().await,
            ExampleKind::Xml => self.xml().await,
            ExampleKind::FlatXml => self.flat_xml().await,
            ExampleKind::FmiXml { cosim } => {
                let simulation = self.xml().await?;
                let input = if cosim {
                    "FMI_cosim.mbsimprj.xml"
                } else {
                    "FMI.mbsimprj.xml"
                };
                // The FMU check is the timed step of this kind.
                let fmu = self.fmu(input, cosim).await?;
                Ok(Steps {
                    state: merge_states(simulation.state, fmu.state),
                    simulation: fmu.simulation,
                })
            }
            ExampleKind::FmiSource { cosim } => {
                let makefile = if cosim { "Makefile_FMI_cosim" } else { "Makefile_FMI" };
                let built = self.make(&["-f", makefile]).await?;
                if !built.is_success() {
                    return Ok(Steps::failed_before_simulation(built));
                }
                let library = if self.ctx.exe_ext == ".exe" {
                    "mbsimfmi_model.dll"
                } else {
                    "mbsimfmi_model.so"
                };
                self.fmu(library, cosim).await
            }
        }
    }

    async fn compiled(&self) -> Result<Steps> {
        let built = self.make(&[]).await?;
        if !built.is_success() {
            return Ok(Steps::failed_before_simulation(built));
        }
        let main = PathBuf::from(format!("./main{}", self.ctx.exe_ext));
        let mut cmd = self.tool_command(main.into_os_string(), Vec::new())?;
        if let Some(bin_dir) = &self.ctx.bin_dir {
            let (name, sub_dir) = if cfg!(windows) {
                ("PATH", "bin")
            } else {
                ("LD_LIBRARY_PATH", "lib")
            };
            let lib_dir = bin_dir.join("..").join(sub_dir);
            let mut paths: Vec<PathBuf> = std::env::var_os(name)
                .map(|value| std::env::split_paths(&value).collect())
                .unwrap_or_default();
            paths.push(lib_dir);
            cmd.env(name, std::env::join_paths(paths)?);
        }
        Ok(self.spawn(cmd, self.ctx.timeout).await?.into())
    }

    async fn xml(&self) -> Result<Steps> {
        let project = xml_project(&self.job.path)?;
        let cmd = self.tool_command(self.ctx.tool("mbsimxml").into_os_string(), vec![project.into()])?;
        Ok(self.spawn(cmd, self.ctx.timeout).await?.into())
    }

    async fn flat_xml(&self) -> Result<Steps> {
        let cmd = self.tool_command(
            self.ctx.tool("mbsimflatxml").into_os_string(),
            vec!["MBS.mbsimprj.flat.xml".into()],
        )?;
        Ok(self.spawn(cmd, self.ctx.timeout).await?.into())
    }

    /// `make [args] clean` (unless disabled) followed by `make [args]`.
    async fn make(&self, args: &[&str]) -> Result<ExitState> {
        if !self.ctx.disable_make_clean {
            let mut clean = self.plain_command("make");
            clean.args(args).arg("clean");
            let cleaned = self.spawn(clean, self.ctx.timeout).await?.state;
            if !cleaned.is_success() {
                return Ok(cleaned);
            }
        }
        let mut build = self.plain_command("make");
        build.args(args);
        Ok(self.spawn(build, self.ctx.timeout).await?.state)
    }

    /// Exports the model as an FMU, runs the FMU checker on it and finally
    /// `mbsimTestFMU` on the unpacked FMU. All three steps always run; their
    /// states are merged and the checker run is the timed step.
    ///
    /// 将模型导出为 FMU，对其运行 FMU 检查器，最后对解压后的 FMU 运行 `mbsimTestFMU`。
    /// 三个步骤总是全部运行；其状态被合并，检查器的运行作为计时步骤。
    async fn fmu(&self, input: &str, cosim: bool) -> Result<Steps> {
        let mut args: Vec<OsString> = vec!["--nocompress".into()];
        if cosim {
            args.push("--cosim".into());
        }
        if self.job.labels.iter().any(|l| l == "noparam") {
            args.push("--noparam".into());
        }
        args.push(input.into());
        let cmd = self.tool_command(self.ctx.tool("mbsimCreateFMU").into_os_string(), args)?;
        let created = self.spawn(cmd, self.ctx.timeout.map(|t| t / 2)).await?;

        let checked = self.fmu_check().await?;
        let tested = self.fmu_test(cosim).await?;

        Ok(Steps {
            state: merge_states(merge_states(created.state, checked.state), tested.state),
            simulation: checked.elapsed,
        })
    }

    /// `fmuCheck.* -f -l 5 -o fmuCheck.result.csv -z tmp_fmuCheck mbsim.fmu`,
    /// followed by converting the CSV into a dataset file.
    async fn fmu_check(&self) -> Result<CommandOutcome> {
        let checker = find_fmu_checker(self.ctx.bin_dir.as_deref())?;
        let tmp_dir = self.job.path.join(FMU_CHECK_TMP_DIR);
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)
                .with_context(|| format!("Failed to remove {}", tmp_dir.display()))?;
        }
        fs::create_dir_all(&tmp_dir)
            .with_context(|| format!("Failed to create {}", tmp_dir.display()))?;

        let mut args: Vec<OsString> = Vec::new();
        if self.ctx.minimal_end_time {
            args.extend(["-s".into(), "0.01".into()]);
        }
        for arg in ["-f", "-l", "5", "-o", FMU_CHECK_CSV, "-z", FMU_CHECK_TMP_DIR, FMU_FILE] {
            args.push(arg.into());
        }
        let cmd = self.tool_command(checker.into_os_string(), args)?;
        let checked = self.spawn(cmd, self.ctx.timeout).await?;

        self.convert_fmu_check_result().await;
        remove_unpacked_fmu(&tmp_dir);
        Ok(checked)
    }

    /// Unpacks `mbsim.fmu` and runs `mbsimTestFMU --me|--cosim tmp_mbsimTestFMU`
    /// with a third of the time limit. A failed unpack only shows up in the job
    /// output; the tool then reports the missing directory itself.
    async fn fmu_test(&self, cosim: bool) -> Result<CommandOutcome> {
        let tmp_dir = self.job.path.join(FMU_TEST_TMP_DIR);
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)
                .with_context(|| format!("Failed to remove {}", tmp_dir.display()))?;
        }
        let fmu = self.job.path.join(FMU_FILE);
        let target = tmp_dir.clone();
        let unpacked = tokio::task::spawn_blocking(move || runner_fs::extract_zip(&fmu, &target))
            .await
            .context("FMU unpack task failed")?;
        match unpacked {
            Ok(()) => self.sink.write(&format!("{}\n", t!("run.unzip_fmu_done"))).await,
            Err(e) => {
                self.sink
                    .write(&format!("{}\n{:#}\n", t!("run.unzip_fmu_failed"), e))
                    .await
            }
        }

        let mode = if cosim { "--cosim" } else { "--me" };
        let cmd = self.tool_command(
            self.ctx.tool("mbsimTestFMU").into_os_string(),
            vec![mode.into(), FMU_TEST_TMP_DIR.into()],
        )?;
        let tested = self.spawn(cmd, self.ctx.timeout.map(|t| t / 3)).await?;

        remove_unpacked_fmu(&tmp_dir);
        Ok(tested)
    }

    /// Best effort: a missing or malformed CSV only shows up in the job output.
    async fn convert_fmu_check_result(&self) {
        let csv = self.job.path.join(FMU_CHECK_CSV);
        let target = self
            .job
            .path
            .join(format!("fmuCheck.result{}", self.ctx.dataset_suffix));
        let converted = fs::read_to_string(&csv)
            .with_context(|| format!("Failed to read {}", csv.display()))
            .and_then(|text| Ok(Dataset::from_csv(FMU_CHECK_DATASET, &text)?))
            .and_then(|dataset| {
                let mut collection = DatasetCollection::new();
                collection.insert(FMU_CHECK_DATASET, dataset);
                collection.save(&target)
            });
        match converted {
            Ok(()) => self.sink.write(&format!("{}\n", t!("run.convert_csv_done"))).await,
            Err(e) => {
                self.sink
                    .write(&format!("{}\n{:#}\n", t!("run.convert_csv_failed"), e))
                    .await
            }
        }
    }

    fn plain_command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.current_dir(&self.job.path);
        cmd
    }

    /// A simulation tool invocation: `[prefix...] [wine] tool args...`.
    fn tool_command(&self, tool: OsString, args: Vec<OsString>) -> Result<Command> {
        let mut argv: Vec<OsString> = self.ctx.prefix_simulation.iter().map(OsString::from).collect();
        if !self.ctx.exe_ext.is_empty() && !cfg!(windows) {
            argv.push("wine".into());
        }
        argv.push(tool);
        argv.extend(args);
        let (program, rest) = argv.split_first().context("Empty command line")?;
        let mut cmd = Command::new(program);
        cmd.args(rest).current_dir(&self.job.path);
        Ok(cmd)
    }

    async fn spawn(&self, cmd: Command, limit: Option<Duration>) -> Result<CommandOutcome> {
        self.sink
            .write(&format!("\n{}\n{:?}\n\n", t!("run.running_command"), cmd.as_std()))
            .await;
        let policy = CommandPolicy::with_limit(limit).inspect_core_dumps(self.ctx.inspect_core_dumps);
        let outcome = command::spawn_and_capture(cmd, &policy, self.sink)
            .await
            .with_context(|| format!("Failed to spawn a command for example {}", self.job.id))?;
        self.sink
            .write(&format!(
                "\n{}\n",
                t!(
                    "run.command_finished",
                    status = outcome.state,
                    duration = format!("{:.3}", outcome.elapsed.as_secs_f64())
                )
            ))
            .await;
        Ok(outcome)
    }
}

fn remove_unpacked_fmu(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove unpacked FMU");
        }
    }
}

/// The XML project file of an example, in order of preference.
fn xml_project(dir: &Path) -> Result<&'static str> {
    [
        "MBS.mbsimprj.xml",
        "MBS.mbsimprj.alpha_py.xml",
        "FMI.mbsimprj.xml",
        "FMI_cosim.mbsimprj.xml",
    ]
    .into_iter()
    .find(|name| dir.join(name).is_file())
    .with_context(|| format!("No XML project file in {}", dir.display()))
}
