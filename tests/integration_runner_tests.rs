//! # Simulation Runner Integration Tests / 仿真运行器集成测试
//!
//! Runs examples end to end against fake simulation tools written as shell
//! scripts, then checks the captured output, the timing file and the
//! comparison against the reference datasets.
//!
//! 使用以 shell 脚本编写的假仿真工具端到端地运行示例，
//! 然后检查捕获的输出、计时文件以及与参考数据集的比较。

#![cfg(unix)]

mod common;

use common::{collection, create_example, dataset, examples_root, write_collection, write_script};
use example_runner::config::{RunContext, RunnerConfig};
use example_runner::core::discovery::discover;
use example_runner::core::execution::{
    count_deprecation_warnings, find_fmu_checker, merge_states, SimulationRunner, EXECUTE_FILE,
};
use example_runner::models::{ComparisonState, ExitState, JobOutcome, Verdict};
use example_runner::scheduler::JobRunner;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const DATASET_FILE: &str = "MBS.dataset.json";

/// An examples root with one XML example and a tool directory holding a fake
/// `mbsimxml` that copies `bin/current.json` into the example.
struct Fixture {
    root: TempDir,
    bin: TempDir,
    report: TempDir,
}

impl Fixture {
    fn new(tool_body: &str) -> Self {
        let root = examples_root();
        create_example(root.path(), "mechanics/pendulum", "MBS.mbsimprj.xml", None);
        let bin = tempdir().unwrap();
        write_script(&bin.path().join("mbsimxml"), tool_body);
        Self {
            root,
            bin,
            report: tempdir().unwrap(),
        }
    }

    fn example_dir(&self) -> std::path::PathBuf {
        self.root.path().join("mechanics/pendulum")
    }

    fn set_current(&self, rows: &[&[f64]]) {
        let current = collection("pendulum/state", dataset(rows, &["time", "x"]));
        write_collection(self.bin.path(), "current.json", &current);
    }

    fn set_reference(&self, rows: &[&[f64]]) {
        let reference = collection("pendulum/state", dataset(rows, &["time", "x"]));
        write_collection(&self.example_dir().join("reference"), DATASET_FILE, &reference);
    }

    fn config(&self) -> RunnerConfig {
        RunnerConfig {
            bin_dir: self.bin.path().to_string_lossy().into_owned(),
            ..RunnerConfig::default()
        }
    }

    async fn run(&self, config: &RunnerConfig) -> JobOutcome {
        run_single(self.root.path(), self.report.path(), config).await
    }
}

/// Runs the only example below `root`.
async fn run_single(root: &Path, report: &Path, config: &RunnerConfig) -> JobOutcome {
    let ctx = RunContext::from_config(config, root.to_path_buf()).unwrap();
    let runner = SimulationRunner::new(Arc::new(ctx), report.to_path_buf());
    let job = discover(root, &[]).unwrap().remove(0);
    let report = runner.run(&job).await.unwrap();
    JobOutcome::from_report(job, report)
}

fn read_time_file(dir: &Path) -> f64 {
    fs::read_to_string(dir.join("time.dat"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

const COPY_RESULT: &str = r#"echo "simulating $1"
echo "Deprecated feature called: old syntax" >&2
cp "$(dirname "$0")/current.json" MBS.dataset.json"#;

#[tokio::test]
async fn test_matching_results_pass() {
    let fixture = Fixture::new(COPY_RESULT);
    fixture.set_current(&[&[0.0, 1.0], &[0.1, 2.0]]);
    fixture.set_reference(&[&[0.0, 1.0], &[0.1, 2.0 + 1e-7]]);

    let outcome = fixture.run(&fixture.config()).await;
    assert_eq!(outcome.verdict, Verdict::Passed);

    let report = outcome.report.unwrap();
    let execution = report.execution.unwrap();
    assert_eq!(execution.status, ExitState::Success);
    assert!(execution.output.contains("simulating MBS.mbsimprj.xml"));
    assert_eq!(execution.artifacts.len(), 1);
    assert_eq!(report.deprecated_warnings, 1);
    match report.comparison {
        ComparisonState::Compared { outcome } => {
            assert!(outcome.passed());
            assert_eq!(outcome.failed, 0);
        }
        other => panic!("unexpected comparison state {:?}", other),
    }
}

#[tokio::test]
async fn test_output_and_timing_files_are_written() {
    let fixture = Fixture::new(COPY_RESULT);
    fixture.set_current(&[&[0.0, 1.0]]);

    let outcome = fixture.run(&fixture.config()).await;
    assert_eq!(outcome.verdict, Verdict::Passed);

    let execute = fs::read_to_string(fixture.report.path().join("mechanics/pendulum").join(EXECUTE_FILE)).unwrap();
    assert!(execute.contains("Running command:"));
    assert!(execute.contains("simulating"));
    assert!(execute.contains("Deprecated feature called"));

    let time = read_time_file(&fixture.example_dir());
    assert!(time >= 0.0);
}

#[tokio::test]
async fn test_deviation_fails_the_example() {
    let fixture = Fixture::new(COPY_RESULT);
    fixture.set_current(&[&[0.0, 1.0], &[0.1, 2.5]]);
    fixture.set_reference(&[&[0.0, 1.0], &[0.1, 2.0]]);

    let outcome = fixture.run(&fixture.config()).await;
    assert_eq!(outcome.verdict, Verdict::Failed);
    let report = outcome.report.unwrap();
    assert!(report.execution.unwrap().status.is_success());
    match report.comparison {
        ComparisonState::Compared { outcome } => {
            assert_eq!(outcome.failed, 1);
            assert_eq!(outcome.artifacts.len(), 1);
            assert_eq!(outcome.artifacts[0].label.as_deref(), Some("x"));
        }
        other => panic!("unexpected comparison state {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_reference_is_reported() {
    let fixture = Fixture::new(COPY_RESULT);
    fixture.set_current(&[&[0.0, 1.0]]);

    let outcome = fixture.run(&fixture.config()).await;
    assert!(matches!(
        outcome.report.unwrap().comparison,
        ComparisonState::NoReference
    ));
}

#[tokio::test]
async fn test_failing_tool_still_compares() {
    let fixture = Fixture::new(&format!("{}\nexit 2", COPY_RESULT));
    fixture.set_current(&[&[0.0, 1.0]]);
    fixture.set_reference(&[&[0.0, 1.0]]);

    let outcome = fixture.run(&fixture.config()).await;
    assert_eq!(outcome.verdict, Verdict::Failed);
    let report = outcome.report.unwrap();
    assert_eq!(report.execution.unwrap().status, ExitState::Failed { code: Some(2) });
    assert!(matches!(report.comparison, ComparisonState::Compared { .. }));
}

#[tokio::test]
async fn test_timeout_marks_example_timed_out() {
    let fixture = Fixture::new("echo started\nsleep 30");
    let config = RunnerConfig {
        // 0.3 seconds
        max_execution_time: 0.005,
        ..fixture.config()
    };

    let start = std::time::Instant::now();
    let outcome = fixture.run(&config).await;
    assert_eq!(outcome.verdict, Verdict::TimedOut);
    assert!(start.elapsed() < std::time::Duration::from_secs(20));
    assert!(outcome.report.unwrap().execution.unwrap().output.contains("started"));
}

#[tokio::test]
async fn test_disabled_run_only_compares() {
    let fixture = Fixture::new("exit 1");
    let current = collection("pendulum/state", dataset(&[&[0.0, 1.0]], &["time", "x"]));
    write_collection(&fixture.example_dir(), DATASET_FILE, &current);
    fixture.set_reference(&[&[0.0, 1.0]]);
    let config = RunnerConfig {
        disable_run: true,
        ..fixture.config()
    };

    let outcome = fixture.run(&config).await;
    assert_eq!(outcome.verdict, Verdict::Passed);
    let report = outcome.report.unwrap();
    assert!(report.execution.is_none());
    assert!(matches!(report.comparison, ComparisonState::Compared { .. }));
    assert!(!fixture.example_dir().join("time.dat").exists());
}

#[tokio::test]
async fn test_disabled_compare() {
    let fixture = Fixture::new(COPY_RESULT);
    fixture.set_current(&[&[0.0, 9.0]]);
    fixture.set_reference(&[&[0.0, 1.0]]);
    let config = RunnerConfig {
        disable_compare: true,
        ..fixture.config()
    };

    let outcome = fixture.run(&config).await;
    assert_eq!(outcome.verdict, Verdict::Passed);
    assert!(matches!(outcome.report.unwrap().comparison, ComparisonState::NotRun));
}

#[tokio::test]
async fn test_stale_results_are_removed_before_running() {
    let fixture = Fixture::new("echo no output");
    let stale = collection("old", dataset(&[&[1.0]], &[]));
    write_collection(&fixture.example_dir(), "stale.dataset.json", &stale);

    let outcome = fixture.run(&fixture.config()).await;
    assert!(outcome.report.unwrap().execution.unwrap().artifacts.is_empty());
    assert!(!fixture.example_dir().join("stale.dataset.json").exists());
}

/// Only running `main` is timed; the slow build is not part of `time.dat`.
#[tokio::test]
async fn test_time_file_excludes_build_steps() {
    let root = examples_root();
    let example = create_example(root.path(), "source/fast_main", "Makefile", None);
    fs::write(example.join("Makefile"), "all:\n\tsleep 2\n\nclean:\n\t@true\n").unwrap();
    write_script(&example.join("main"), "echo integrated");
    let bin = tempdir().unwrap();
    let report = tempdir().unwrap();
    let config = RunnerConfig {
        bin_dir: bin.path().to_string_lossy().into_owned(),
        ..RunnerConfig::default()
    };

    let start = std::time::Instant::now();
    let outcome = run_single(root.path(), report.path(), &config).await;
    assert!(start.elapsed() >= std::time::Duration::from_secs(2));

    let execution = outcome.report.unwrap().execution.unwrap();
    assert!(execution.status.is_success());
    assert!(execution.output.contains("integrated"));
    assert!(execution.elapsed < std::time::Duration::from_secs(2));
    let time = read_time_file(&example);
    assert!(time < 2.0, "time.dat holds {}", time);
}

/// A failing build leaves nothing to time.
#[tokio::test]
async fn test_failed_build_writes_zero_time() {
    let root = examples_root();
    let example = create_example(root.path(), "source/broken", "Makefile", None);
    fs::write(example.join("Makefile"), "all:\n\texit 4\n\nclean:\n\t@true\n").unwrap();
    let report = tempdir().unwrap();

    let outcome = run_single(root.path(), report.path(), &RunnerConfig::default()).await;
    assert_eq!(outcome.verdict, Verdict::Failed);
    assert_eq!(read_time_file(&example), 0.0);
}

/// An FMI export example with fake `mbsimxml`, `mbsimCreateFMU`, `fmuCheck`
/// and `mbsimTestFMU` tools. `mbsimCreateFMU` copies `bin/model.fmu`.
struct FmiFixture {
    root: TempDir,
    bin: TempDir,
    report: TempDir,
}

const CREATE_FMU: &str = r#"echo "create $*"
cp "$(dirname "$0")/model.fmu" mbsim.fmu"#;

const CHECK_FMU: &str = r#"test -d tmp_fmuCheck || exit 9
echo "checking $*"
printf '"time","x"\n0.0,1.0\n0.1,2.0\n' > fmuCheck.result.csv"#;

const TEST_FMU: &str = r#"echo "testing $1"
test -f "$2/modelDescription.xml" || exit 7
cat "$2/modelDescription.xml""#;

impl FmiFixture {
    fn new(create_body: &str, test_body: &str) -> Self {
        let root = examples_root();
        create_example(root.path(), "fmi/export", "FMI.mbsimprj.xml", None);
        let bin = tempdir().unwrap();
        write_script(&bin.path().join("mbsimxml"), r#"echo "preprocessing $1""#);
        write_script(&bin.path().join("mbsimCreateFMU"), create_body);
        write_script(&bin.path().join("fmuCheck.linux64"), CHECK_FMU);
        write_script(&bin.path().join("mbsimTestFMU"), test_body);
        write_fmu(&bin.path().join("model.fmu"));
        Self {
            root,
            bin,
            report: tempdir().unwrap(),
        }
    }

    fn example_dir(&self) -> std::path::PathBuf {
        self.root.path().join("fmi/export")
    }

    fn config(&self) -> RunnerConfig {
        RunnerConfig {
            bin_dir: self.bin.path().to_string_lossy().into_owned(),
            ..RunnerConfig::default()
        }
    }

    async fn run(&self, config: &RunnerConfig) -> JobOutcome {
        run_single(self.root.path(), self.report.path(), config).await
    }
}

/// Writes an uncompressed FMU holding a model description and one binary.
fn write_fmu(path: &Path) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("modelDescription.xml", options).unwrap();
    writer
        .write_all(br#"<fmiModelDescription modelName="pendulum"/>"#)
        .unwrap();
    writer.add_directory("binaries/linux64/", options).unwrap();
    writer.start_file("binaries/linux64/mbsim.so", options).unwrap();
    writer.write_all(b"\x7fELF").unwrap();
    writer.finish().unwrap();
}

#[tokio::test]
async fn test_fmu_is_created_checked_and_tested() {
    let fixture = FmiFixture::new(CREATE_FMU, TEST_FMU);

    let outcome = fixture.run(&fixture.config()).await;
    assert_eq!(outcome.verdict, Verdict::Passed);
    let execution = outcome.report.unwrap().execution.unwrap();
    assert_eq!(execution.status, ExitState::Success);

    let output = &execution.output;
    assert!(output.contains("preprocessing FMI.mbsimprj.xml"));
    assert!(output.contains("create --nocompress FMI.mbsimprj.xml"));
    assert!(output.contains("checking -f -l 5 -o fmuCheck.result.csv -z tmp_fmuCheck mbsim.fmu"));
    assert!(output.contains("Unpacked mbsim.fmu for mbsimTestFMU."));
    assert!(output.contains("testing --me"));
    assert!(output.contains(r#"<fmiModelDescription modelName="pendulum"/>"#));

    let example = fixture.example_dir();
    assert!(example.join("fmuCheck.result.dataset.json").is_file());
    assert!(!example.join("tmp_fmuCheck").exists());
    assert!(!example.join("tmp_mbsimTestFMU").exists());
}

/// A failed export still runs the checker and the FMU test; the first
/// failure decides the state.
#[tokio::test]
async fn test_failed_fmu_export_runs_remaining_steps() {
    let fixture = FmiFixture::new("echo export failed\nexit 3", TEST_FMU);

    let outcome = fixture.run(&fixture.config()).await;
    assert_eq!(outcome.verdict, Verdict::Failed);
    let execution = outcome.report.unwrap().execution.unwrap();
    assert_eq!(execution.status, ExitState::Failed { code: Some(3) });

    let output = &execution.output;
    assert!(output.contains("export failed"));
    assert!(output.contains("checking"));
    assert!(output.contains("Failed to unpack mbsim.fmu for mbsimTestFMU:"));
    assert!(output.contains("testing --me"));
    assert!(!fixture.example_dir().join("tmp_mbsimTestFMU").exists());
}

/// `mbsimTestFMU` gets a third of the limit and its timeout wins over the
/// successful earlier steps.
#[tokio::test]
async fn test_fmu_test_timeout_dominates() {
    let fixture = FmiFixture::new(CREATE_FMU, "echo testing\nsleep 30");
    let config = RunnerConfig {
        // 3 seconds, 1 second for mbsimTestFMU
        max_execution_time: 0.05,
        ..fixture.config()
    };

    let start = std::time::Instant::now();
    let outcome = fixture.run(&config).await;
    assert_eq!(outcome.verdict, Verdict::TimedOut);
    assert!(start.elapsed() < std::time::Duration::from_secs(20));
    assert_eq!(outcome.report.unwrap().execution.unwrap().status, ExitState::TimedOut);
    assert!(!fixture.example_dir().join("tmp_mbsimTestFMU").exists());
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), "").unwrap();
}

#[test]
fn test_find_fmu_checker() {
    let bin = tempdir().unwrap();
    assert!(find_fmu_checker(None).is_err());
    assert!(find_fmu_checker(Some(bin.path())).is_err());

    touch(bin.path(), "fmuCheck.linux64");
    assert_eq!(
        find_fmu_checker(Some(bin.path())).unwrap(),
        bin.path().join("fmuCheck.linux64")
    );

    touch(bin.path(), "fmuCheck.win64.exe");
    assert!(find_fmu_checker(Some(bin.path())).is_err());
}

#[test]
fn test_merge_states() {
    let failed = |code| ExitState::Failed { code: Some(code) };
    assert_eq!(merge_states(ExitState::Success, ExitState::Success), ExitState::Success);
    assert_eq!(merge_states(ExitState::Success, failed(2)), failed(2));
    assert_eq!(merge_states(failed(1), failed(2)), failed(1));
    assert_eq!(merge_states(failed(1), ExitState::TimedOut), ExitState::TimedOut);
    assert_eq!(merge_states(ExitState::TimedOut, ExitState::Success), ExitState::TimedOut);
}

#[test]
fn test_count_deprecation_warnings() {
    let output = "start\nDeprecated feature called: a\nok\nWARNING Deprecated feature called: b\n";
    assert_eq!(count_deprecation_warnings(output), 2);
    assert_eq!(count_deprecation_warnings(""), 0);
}
