use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

use common::{collection, create_example, dataset, examples_root, write_collection, write_reference_time};

fn runner(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("example-runner").unwrap();
    cmd.current_dir(cwd).arg("--lang").arg("en");
    cmd
}

/// Creates an examples tree with one XML example whose current results are
/// already present next to its reference.
///
/// 创建一个示例树，其中包含一个 XML 示例，其当前结果已与参考数据并存。
fn tree_with_results(current_x: f64) -> tempfile::TempDir {
    let root = examples_root();
    let example = create_example(root.path(), "mechanics/pendulum", "MBS.mbsimprj.xml", None);
    let current = collection("state", dataset(&[&[0.0, 1.0], &[0.1, current_x]], &["time", "x"]));
    let reference = collection("state", dataset(&[&[0.0, 1.0], &[0.1, 2.0]], &["time", "x"]));
    write_collection(&example, "MBS.dataset.json", &current);
    write_collection(&example.join("reference"), "MBS.dataset.json", &reference);
    write_reference_time(&example, 3.0);
    root
}

/// With running disabled the existing results are compared, and a matching
/// result makes the whole run pass.
///
/// 禁用运行时会比较已有结果，匹配的结果使整个运行通过。
#[test]
fn test_compare_only_run_passes() {
    let root = tree_with_results(2.0);
    runner(root.path())
        .args(["run", "--disable-run", "-j", "2", "--report-dir", "report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mechanics/pendulum"))
        .stdout(predicate::str::contains("All examples passed."));

    let results = std::fs::read_to_string(root.path().join("report/results.jsonl")).unwrap();
    assert_eq!(results.lines().count(), 1);
    assert!(results.contains("\"verdict\":\"passed\""));
}

/// A deviating result fails the run and writes a diff artifact.
/// 偏离的结果会使运行失败并写入差异产物。
#[test]
fn test_compare_only_run_fails_on_deviation() {
    let root = tree_with_results(2.5);
    runner(root.path())
        .args(["run", "--disable-run", "--report-dir", "report"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAILED:"))
        .stderr(predicate::str::contains("1 examples failed."));

    assert!(root.path().join("report/mechanics/pendulum/diff_001.json").is_file());
}

#[test]
fn test_willfail_label_does_not_fail_the_run() {
    let root = tree_with_results(2.5);
    std::fs::write(root.path().join("mechanics/pendulum/labels"), "nightly willfail").unwrap();
    runner(root.path())
        .args(["run", "--disable-run", "--report-dir", "report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Allowed failure"));
}

#[test]
fn test_missing_tool_directory_is_a_setup_error() {
    let root = tree_with_results(2.0);
    runner(root.path())
        .args(["run", "--bin-dir", "does/not/exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Tool directory not found"));
}

#[test]
fn test_list_prints_planned_examples() {
    let root = examples_root();
    create_example(root.path(), "a/slow", "Makefile", None);
    create_example(root.path(), "b/fast", "MBS.mbsimprj.flat.xml", None);
    create_example(root.path(), "c/daily", "MBS.mbsimprj.xml", Some("daily"));
    write_reference_time(&root.path().join("a/slow"), 60.0);
    write_reference_time(&root.path().join("b/fast"), 1.0);

    runner(root.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("a/slow"))
        .stdout(predicate::str::contains("b/fast"))
        .stdout(predicate::str::contains("c/daily").not())
        .stdout(predicate::str::contains("2 examples (1 filtered out)."));

    runner(root.path())
        .args(["list", "--labels", "daily,nightly", "--kinds", "xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("c/daily"))
        .stdout(predicate::str::contains("1 examples (2 filtered out)."));
}

#[test]
fn test_compare_files() {
    let dir = examples_root();
    let reference = collection("state", dataset(&[&[0.0, 1.0]], &["time", "x"]));
    let close = collection("state", dataset(&[&[0.0, 1.0 + 1e-7]], &["time", "x"]));
    let far = collection("state", dataset(&[&[0.0, 1.5]], &["time", "x"]));
    write_collection(dir.path(), "ref.json", &reference);
    write_collection(dir.path(), "close.json", &close);
    write_collection(dir.path(), "far.json", &far);

    runner(dir.path())
        .args(["compare", "ref.json", "close.json"])
        .assert()
        .success();

    runner(dir.path())
        .args(["compare", "ref.json", "far.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 comparison items failed."));

    // A loose tolerance accepts the deviation.
    runner(dir.path())
        .args(["compare", "ref.json", "far.json", "--atol", "1.0"])
        .assert()
        .success();
}

#[test]
fn test_compare_file_with_directory_is_rejected() {
    let dir = examples_root();
    let reference = collection("state", dataset(&[&[0.0]], &[]));
    write_collection(dir.path(), "ref.json", &reference);
    runner(dir.path())
        .args(["compare", "ref.json", "."])
        .assert()
        .failure();
}

#[test]
fn test_copy_to_reference() {
    let root = tree_with_results(2.5);
    std::fs::write(root.path().join("mechanics/pendulum/time.dat"), "4.000\n").unwrap();
    runner(root.path())
        .arg("copy-to-reference")
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied 2 files of 1 examples to reference."));

    // The reference now equals the current results.
    runner(root.path())
        .args(["run", "--disable-run", "--report-dir", "report"])
        .assert()
        .success();
}

#[test]
fn test_init_non_interactive_creates_config() {
    let dir = examples_root();
    runner(dir.path())
        .args(["init", "--non-interactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let content = std::fs::read_to_string(dir.path().join("RunExamples.toml")).unwrap();
    assert!(content.contains("max_execution_time"));
    assert!(content.contains("[filter]"));
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    let dir = examples_root();
    runner(dir.path())
        .args(["list", "--config", "absent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = examples_root();
    runner(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("copy-to-reference"));
}
